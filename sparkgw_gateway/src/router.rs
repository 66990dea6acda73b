//! Restful API of the gateway.

use ::anyhow::anyhow;
use ::axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use ::serde::Deserialize;
use ::serde_json::{json, Value};
use ::sparkgw_common::{
    application::GatewayApplication,
    error::{GatewayError, Result},
    ledger::Ledger,
    middleware::Identity,
};

use crate::state::AppState;

type QueryResult<T> = std::result::Result<Query<T>, QueryRejection>;

fn query<T>(query: QueryResult<T>) -> Result<T> {
    query
        .map(|Query(query)| query)
        .map_err(GatewayError::bad_request)
}

#[derive(Debug, Deserialize)]
struct CreateQuery {
    cluster: Option<String>,
}

/// Submit a Spark application
async fn create_application<L: Ledger>(
    State(state): State<AppState<L>>,
    identity: Identity,
    params: QueryResult<CreateQuery>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let CreateQuery { cluster } = query(params)?;
    let application = state
        .orchestrator()
        .create(identity.user(), &body, cluster.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    namespace: String,
    cluster: Option<String>,
}

async fn list_applications<L: Ledger>(
    State(state): State<AppState<L>>,
    params: QueryResult<ListQuery>,
) -> Result<Json<Vec<GatewayApplication>>> {
    let ListQuery { namespace, cluster } = query(params)?;
    state
        .orchestrator()
        .list(&namespace, cluster.as_deref())
        .await
        .map(Json)
}

async fn get_application<L: Ledger>(
    Path(id): Path<String>,
    State(state): State<AppState<L>>,
) -> Result<Json<GatewayApplication>> {
    state.orchestrator().get(&id).await.map(Json)
}

async fn delete_application<L: Ledger>(
    Path(id): Path<String>,
    State(state): State<AppState<L>>,
) -> Result<Json<Value>> {
    state.orchestrator().delete(&id).await?;
    Ok(Json(json!({"status": "success"})))
}

async fn get_status<L: Ledger>(
    Path(id): Path<String>,
    State(state): State<AppState<L>>,
) -> Result<Json<Value>> {
    state.orchestrator().status(&id).await.map(Json)
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    lines: Option<i64>,
}

async fn get_logs<L: Ledger>(
    Path(id): Path<String>,
    State(state): State<AppState<L>>,
    params: QueryResult<LogsQuery>,
) -> Result<String> {
    let lines = query(params)?
        .lines
        .unwrap_or(state.default_log_lines());
    if lines <= 0 {
        return Err(GatewayError::bad_request(anyhow!(
            "lines must be positive, got {}",
            lines
        )));
    }
    state.orchestrator().logs(&id, lines).await
}

pub(crate) fn get_application_router<L: Ledger>() -> Router<AppState<L>> {
    Router::new()
        .route(
            "/",
            get(list_applications::<L>).post(create_application::<L>),
        )
        .route(
            "/:id",
            get(get_application::<L>).delete(delete_application::<L>),
        )
        .route("/:id/status", get(get_status::<L>))
        .route("/:id/logs", get(get_logs::<L>))
}
