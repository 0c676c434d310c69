//! Редактор конфигов, EULA и иконка сервера.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::{ApiResult, SharedState, Success};
use crate::configs::{ConfigDocument, SaveRequest};
use crate::server::eula::{accept_eula, check_eula};
use crate::server::icon::set_icon;
use crate::server::EulaStatus;

#[derive(Debug, Serialize)]
pub struct ConfigsResponse {
    pub success: bool,
    pub configs: Vec<ConfigDocument>,
}

async fn index(State(state): State<SharedState>, Path(server): Path<String>) -> Json<ConfigsResponse> {
    Json(ConfigsResponse {
        success: true,
        configs: state.configs.list(&server).await,
    })
}

async fn save(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<SaveRequest>, JsonRejection>,
) -> ApiResult<Json<Success>> {
    let Json(request) = body?;
    state.configs.save(&server, &request).await?;
    Ok(Success::ok())
}

async fn eula_status(State(state): State<SharedState>, Path(server): Path<String>) -> Json<EulaStatus> {
    Json(check_eula(state.gateway.as_ref(), &server).await)
}

async fn eula_accept(State(state): State<SharedState>, Path(server): Path<String>) -> ApiResult<Json<Success>> {
    accept_eula(state.gateway.as_ref(), &server).await?;
    Ok(Success::ok())
}

/// Тело запроса: само изображение
pub async fn upload_icon(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Success>> {
    set_icon(state.gateway.as_ref(), &server, &body).await?;
    Ok(Success::ok())
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/save", post(save))
        .route("/eula", get(eula_status))
        .route("/eula/accept", post(eula_accept))
}
