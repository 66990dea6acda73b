use ::kube::{
    runtime::{watcher, WatchStreamExt},
    Api, Client,
};
use ::sparkgw_common::{
    application::SparkApplication,
    config::{load_config, Args},
    error::{GatewayError, Result},
    server::{serve, shutdown_signal, Shutdown},
};
use ::sparkgw_manager::{
    cache::watch_cache, cluster::KubeCluster, config::ManagerConfig, get_server,
    watch::run_watch_loop,
};
use ::tokio::net::TcpListener;
use ::tracing::{info, warn};

#[tokio::main]
/// Start the manager of one cluster
async fn main() -> Result<()> {
    // setup tracing
    tracing_subscriber::fmt::init();

    let Args { config_path } = Args::parse_args();
    let config: ManagerConfig = load_config(&config_path)?;
    info!("Start Spark Gateway manager of cluster {}", config.cluster_id);

    let client = Client::try_default()
        .await
        .map_err(|e| GatewayError::internal(e).context("Failed to create Kubernetes client"))?;
    let version = client
        .apiserver_version()
        .await
        .map_err(|e| GatewayError::internal(e).context("Kubernetes API server is unreachable"))?;
    info!("Connected to Kubernetes {}", version.git_version);

    let shutdown = Shutdown::new();
    let (cache, writers) = watch_cache(&config.namespaces);
    let router = get_server(&config, KubeCluster::new(client.clone()), cache)?;
    let watch_loops: Vec<_> = writers
        .into_iter()
        .map(|writer| {
            let api: Api<SparkApplication> = match writer.scope() {
                Some(namespace) => Api::namespaced(client.clone(), namespace),
                None => Api::all(client.clone()),
            };
            tokio::spawn(run_watch_loop(
                move || watcher(api.clone(), watcher::Config::default()).default_backoff(),
                writer,
                shutdown.listener(),
            ))
        })
        .collect();

    let listener = TcpListener::bind(config.address)
        .await
        .map_err(GatewayError::internal)?;
    info!(
        "Manager is listening on {}",
        listener.local_addr().map_err(GatewayError::internal)?
    );

    let server_shutdown = shutdown.listener();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });
    serve(listener, router, config.shutdown_grace(), server_shutdown).await?;

    for watch_loop in watch_loops {
        if let Err(e) = watch_loop.await {
            warn!("Watch loop did not stop cleanly: {}", e);
        }
    }
    info!("Manager stopped");
    Ok(())
}
