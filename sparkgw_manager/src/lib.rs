//! Manager of one Kubernetes cluster: serves the SparkApplications of the cluster to the
//! gateway, reading from a watch cache and writing through the API server.

use ::std::sync::Arc;

use ::axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ::axum_extra::middleware::option_layer;
use ::serde_json::json;
use ::sparkgw_common::{
    error::Result,
    middleware::{authenticate, MiddlewareChain},
    server::with_common_layers,
};

use cache::CacheReader;
use cluster::ClusterApi;
use config::ManagerConfig;
use repository::ApplicationRepository;
use router::get_application_router;
use state::AppState;

pub mod cache;
pub mod cluster;
pub mod config;
pub mod repository;
pub(crate) mod router;
pub(crate) mod state;
pub mod watch;

async fn readyz<C: ClusterApi>(State(state): State<AppState<C>>) -> Response {
    if state.is_ready() {
        "ready".into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "Watch cache is not in sync"})),
        )
            .into_response()
    }
}

/// Build the router of the manager.
/// Fails if the configuration is unusable or the middleware chain cannot be built.
pub fn get_server<C>(config: &ManagerConfig, cluster: C, cache: CacheReader) -> Result<Router>
where
    C: ClusterApi,
{
    config.validate()?;
    let chain = MiddlewareChain::build(&config.middleware)?;
    let repository = ApplicationRepository::new(cluster, cache.clone(), config.confirm_policy());
    let app_state = AppState::new(
        repository,
        cache,
        config.default_log_lines,
        config.watch_max_failures,
    );

    let api = get_application_router::<C>().layer(option_layer(
        (!chain.is_empty())
            .then(|| middleware::from_fn_with_state(Arc::new(chain), authenticate)),
    ));
    let router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz::<C>))
        .nest("/api/v1beta2", api)
        .with_state(app_state);
    Ok(with_common_layers(router, config.request_timeout()))
}
