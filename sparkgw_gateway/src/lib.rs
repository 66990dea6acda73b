//! Spark Gateway: one stable API for Spark applications spread over many Kubernetes
//! clusters, each served by its own manager.

use ::std::sync::Arc;

use ::axum::{middleware, routing::get, Router};
use ::axum_extra::middleware::option_layer;
use ::sparkgw_common::{
    cluster::ClusterRegistry,
    error::Result,
    ledger::Ledger,
    middleware::{authenticate, MiddlewareChain},
    server::with_common_layers,
};

use config::GatewayConfig;
use orchestrator::Orchestrator;
use router::get_application_router;
use state::AppState;

pub mod backfill;
pub mod config;
pub mod manager_client;
pub mod orchestrator;
pub(crate) mod router;
pub(crate) mod state;

/// This is the only entry for users to get the gateway.
/// Fails if the cluster table or the middleware chain is invalid.
/// # Return the router for the server
pub fn get_server<L>(config: &GatewayConfig, ledger: Option<Arc<L>>) -> Result<Router>
where
    L: Ledger,
{
    let registry = ClusterRegistry::new(config.clusters.clone())?;
    let chain = MiddlewareChain::build(&config.middleware)?;
    let http = manager_client::http_client(config.manager_timeout())?;
    let orchestrator = Orchestrator::new(
        registry,
        http,
        ledger,
        config.delete_not_found_is_success,
    );
    let app_state = AppState::new(orchestrator, config.default_log_lines);

    // go through the router from outer to inner
    let applications = get_application_router::<L>().layer(option_layer(
        (!chain.is_empty())
            .then(|| middleware::from_fn_with_state(Arc::new(chain), authenticate)),
    ));
    let router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/v1/applications", applications)
        .with_state(app_state);
    Ok(with_common_layers(router, config.request_timeout()))
}
