//! Restful API of the manager, namespace/name addressed like the Kubernetes API.

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
    application::SparkApplication,
    error::{GatewayError, Result},
};

use crate::{cluster::ClusterApi, state::AppState};

async fn list_applications<C: ClusterApi>(
    Path(namespace): Path<String>,
    State(state): State<AppState<C>>,
) -> Json<Vec<SparkApplication>> {
    Json(state.repository().list(&namespace))
}

async fn create_application<C: ClusterApi>(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState<C>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let application = SparkApplication::parse(&body)?;
    if application.namespace() != namespace || application.name() != name {
        return Err(GatewayError::bad_request(anyhow!(
            "SparkApplication {}/{} does not match the path {}/{}",
            application.namespace(),
            application.name(),
            namespace,
            name
        )));
    }
    let created = state.repository().create(application).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_application<C: ClusterApi>(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState<C>>,
) -> Result<Json<SparkApplication>> {
    state.repository().get(&namespace, &name).map(Json)
}

async fn delete_application<C: ClusterApi>(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState<C>>,
) -> Result<Json<Value>> {
    state.repository().delete(&namespace, &name).await?;
    Ok(Json(json!({"status": "success"})))
}

async fn get_status<C: ClusterApi>(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState<C>>,
) -> Result<Json<Value>> {
    state.repository().status(&namespace, &name).map(Json)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogsQuery {
    lines: Option<i64>,
}

async fn get_logs<C: ClusterApi>(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState<C>>,
    query: std::result::Result<Query<LogsQuery>, QueryRejection>,
) -> Result<String> {
    let Query(LogsQuery { lines }) = query.map_err(GatewayError::bad_request)?;
    let lines = lines.unwrap_or(state.default_log_lines());
    if lines <= 0 {
        return Err(GatewayError::bad_request(anyhow!(
            "lines must be positive, got {}",
            lines
        )));
    }
    state.repository().logs(&namespace, &name, lines).await
}

pub(crate) fn get_application_router<C: ClusterApi>() -> Router<AppState<C>> {
    Router::new()
        .route("/:namespace", get(list_applications::<C>))
        .route(
            "/:namespace/:name",
            get(get_application::<C>)
                .post(create_application::<C>)
                .delete(delete_application::<C>),
        )
        .route("/:namespace/:name/status", get(get_status::<C>))
        .route("/:namespace/:name/logs", get(get_logs::<C>))
}
