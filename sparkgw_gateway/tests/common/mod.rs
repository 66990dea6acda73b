#![allow(dead_code)]

use ::std::sync::Arc;

use ::mockall::mock;
use ::serde_json::{from_value, json, Value};
use ::sparkgw_common::{
    error::{GatewayError, Result},
    ledger::{Ledger, SubmissionRecord},
};
use ::sparkgw_gateway::{config::GatewayConfig, get_server};
use axum_test::TestServer;

mock! {
    pub Ledger {}
    impl Ledger for Ledger {
        async fn record_submission(&self, record: SubmissionRecord) -> Result<()>;
        async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>>;
    }
}

/// Gateway with one cluster `c1` owning namespace `ns` (id `ns1`) and a second cluster
/// `c2` owning `ns` (id `ns2`) and `other` (id `other2`).
pub fn gateway_config(c1_manager: &str, c2_manager: &str, extra: Value) -> GatewayConfig {
    let mut config = json!({
        "address": "127.0.0.1:0",
        "clusters": [
            {
                "id": "c1",
                "name": "cluster one",
                "master_url": "https://c1.example.com",
                "manager_url": c1_manager,
                "namespaces": [{"name": "ns", "id": "ns1"}]
            },
            {
                "id": "c2",
                "name": "cluster two",
                "master_url": "https://c2.example.com",
                "manager_url": c2_manager,
                "namespaces": [{"name": "ns", "id": "ns2"}, {"name": "other", "id": "other2"}]
            }
        ],
        "manager_timeout_secs": 5
    });
    if let (Some(config), Value::Object(extra)) = (config.as_object_mut(), extra) {
        config.extend(extra);
    }
    from_value(config).unwrap()
}

pub fn get_test_server(config: &GatewayConfig, ledger: Option<MockLedger>) -> Result<TestServer> {
    let app = get_server(config, ledger.map(Arc::new))?;
    TestServer::new(app).map_err(GatewayError::internal)
}

/// A SparkApplication as a manager returns it.
pub fn managed_application(name: &str, namespace: &str, original: &str) -> Value {
    json!({
        "apiVersion": "sparkoperator.k8s.io/v1beta2",
        "kind": "SparkApplication",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": "uid-1",
            "annotations": {"applicationName": original, "spark-gateway/user": "alice"},
            "labels": {"spark-gateway/managed-by": "spark-gateway"}
        },
        "spec": {"type": "Scala", "mainClass": "org.example.Main"}
    })
}

pub fn submission(name: &str, namespace: &str) -> Value {
    json!({
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"type": "Scala", "mainClass": "org.example.Main"}
    })
}
