use ::std::sync::Arc;

use ::sparkgw_common::{
    cluster::ClusterRegistry,
    config::{load_config, Args},
    error::{GatewayError, Result},
    ledger::SurrealLedger,
    server::{serve, shutdown_signal, Shutdown},
};
use ::sparkgw_gateway::{
    backfill::run_ledger_backfill, config::GatewayConfig, get_server, manager_client::http_client,
};
use ::tokio::net::TcpListener;
use ::tracing::{info, warn};

#[tokio::main]
/// Start the Spark Gateway
async fn main() -> Result<()> {
    // setup tracing
    tracing_subscriber::fmt::init();

    let Args { config_path } = Args::parse_args();
    let config: GatewayConfig = load_config(&config_path)?;
    info!(
        "Start Spark Gateway with {} clusters",
        config.clusters.len()
    );

    let ledger = match &config.database {
        Some(database) => Some(Arc::new(SurrealLedger::connect(database).await?)),
        None => {
            warn!("No database configured, submissions are not recorded");
            None
        }
    };
    let router = get_server(&config, ledger.clone())?;

    let shutdown = Shutdown::new();
    let backfill = match (ledger, config.ledger_backfill_interval()) {
        (Some(ledger), Some(interval)) => Some(tokio::spawn(run_ledger_backfill(
            ClusterRegistry::new(config.clusters.clone())?,
            http_client(config.manager_timeout())?,
            ledger,
            interval,
            shutdown.listener(),
        ))),
        _ => None,
    };

    let listener = TcpListener::bind(config.address)
        .await
        .map_err(GatewayError::internal)?;
    info!(
        "Spark Gateway is listening on {}",
        listener.local_addr().map_err(GatewayError::internal)?
    );

    let server_shutdown = shutdown.listener();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });
    serve(listener, router, config.shutdown_grace(), server_shutdown).await?;

    if let Some(backfill) = backfill {
        if let Err(e) = backfill.await {
            warn!("Ledger backfill did not stop cleanly: {}", e);
        }
    }
    info!("Spark Gateway stopped");
    Ok(())
}
