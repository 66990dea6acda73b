use ::std::sync::{Arc, Mutex};

use ::mockall::mock;
use ::serde_json::{from_value, json, Value};
use ::sparkgw_common::{
    application::SparkApplication,
    error::{GatewayError, Result},
};
use ::sparkgw_manager::{
    cache::{watch_cache, CacheWriter, Event},
    cluster::ClusterApi,
    config::ManagerConfig,
    get_server,
};
use axum_test::TestServer;

mock! {
    pub Cluster {}
    impl ClusterApi for Cluster {
        async fn create(&self, application: &SparkApplication) -> Result<SparkApplication>;
        async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
        async fn logs(&self, namespace: &str, pod: &str, tail_lines: i64) -> Result<String>;
    }
}

/// Writer of the watch cache, shared with mock expectations that play the watch stream.
pub type SharedWriter = Arc<Mutex<CacheWriter>>;

pub fn test_config(middleware: Value) -> ManagerConfig {
    from_value(json!({
        "address": "127.0.0.1:0",
        "cluster_id": "c1",
        "middleware": middleware,
        "default_log_lines": 20,
        "confirm_timeout_millis": 500,
        "confirm_initial_backoff_millis": 5,
        "confirm_max_backoff_millis": 50
    }))
    .unwrap()
}

/// Start a manager on a synced, empty cache.
pub fn get_test_server(cluster: MockCluster) -> Result<(TestServer, SharedWriter)> {
    get_test_server_with_config(test_config(json!([])), cluster)
}

pub fn get_test_server_with_config(
    config: ManagerConfig,
    cluster: MockCluster,
) -> Result<(TestServer, SharedWriter)> {
    let (cache, mut writers) = watch_cache(&config.namespaces);
    let mut writer = writers.remove(0);
    writer.apply(Event::Init);
    writer.apply(Event::InitDone);
    let app = get_server(&config, cluster, cache)?;
    let server = TestServer::new(app).map_err(GatewayError::internal)?;
    Ok((server, Arc::new(Mutex::new(writer))))
}

pub fn apply(writer: &SharedWriter, event: Event<SparkApplication>) {
    writer.lock().unwrap().apply(event);
}

pub fn application(namespace: &str, name: &str) -> SparkApplication {
    SparkApplication::parse(
        json!({
            "metadata": {"name": name, "namespace": namespace},
            "spec": {"type": "Scala", "mainClass": "org.example.Main"}
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap()
}
