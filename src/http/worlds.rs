//! Миры: каталог CurseForge, установленные миры, статус скачивания.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mcpanel_core::{ContentItem, ContentKind, ContentVersion, JobKind};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::content::{list_versions, provider_for, search_catalog, start};
use super::{
    required, ApiResult, CatalogQuery, ListResponse, PaginationMeta, ProviderQuery, SharedState, Started,
    Success,
};
use crate::jobs::{InstallJob, JobRequest};
use crate::redirect::RemoteFileInfo;
use crate::server::WorldEntry;

#[derive(Debug, Deserialize)]
pub struct WorldBody {
    pub provider: Option<String>,
    pub world_id: Option<String>,
    pub version_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NameBody {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActiveWorldMeta {
    pub active_world: String,
}

async fn index(
    State(state): State<SharedState>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<ListResponse<ContentItem, PaginationMeta>>> {
    search_catalog(&state, ContentKind::World, &query).await
}

async fn versions(
    State(state): State<SharedState>,
    Path((_server, world_id)): Path<(String, String)>,
    Query(query): Query<ProviderQuery>,
) -> ApiResult<Json<ListResponse<ContentVersion>>> {
    list_versions(&state, ContentKind::World, &world_id, &query).await
}

async fn installed(
    State(state): State<SharedState>,
    Path(server): Path<String>,
) -> Json<ListResponse<WorldEntry, ActiveWorldMeta>> {
    let installed = state.worlds.installed(&server).await;
    Json(ListResponse::with_meta(
        installed.worlds,
        ActiveWorldMeta {
            active_world: installed.active_world,
        },
    ))
}

async fn delete(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<NameBody>, JsonRejection>,
) -> ApiResult<Json<Success>> {
    let Json(body) = body?;
    state
        .worlds
        .delete(&server, required("name", body.name.as_deref())?)
        .await?;
    Ok(Success::ok())
}

async fn set_active(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<NameBody>, JsonRejection>,
) -> ApiResult<Json<Success>> {
    let Json(body) = body?;
    state
        .worlds
        .set_active(&server, required("name", body.name.as_deref())?)
        .await?;
    Ok(Success::ok())
}

async fn install(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<WorldBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Started>)> {
    let Json(body) = body?;
    let provider = provider_for(&state, ContentKind::World, body.provider.as_deref())?;
    let world_id = required("world_id", body.world_id.as_deref())?.to_string();
    let version_id = required("version_id", body.version_id.as_deref())?.to_string();

    let job = InstallJob::new(
        server,
        JobRequest::World {
            provider,
            world_id,
            version_id,
        },
    );
    start(&state, job, "World download started").await
}

/// Статус по ключу `world_download:<id>`
async fn download_status(
    State(state): State<SharedState>,
    Path((_server, download_id)): Path<(String, String)>,
) -> Response {
    match state.progress.get(&JobKind::World.progress_key(&download_id)).await {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "not_found",
                "message": "Download not found or expired",
            })),
        )
            .into_response(),
    }
}

async fn query_file(
    State(state): State<SharedState>,
    body: Result<Json<WorldBody>, JsonRejection>,
) -> ApiResult<Json<RemoteFileInfo>> {
    let Json(body) = body?;
    let provider = provider_for(&state, ContentKind::World, body.provider.as_deref())?;
    let world_id = required("world_id", body.world_id.as_deref())?;
    let version_id = required("version_id", body.version_id.as_deref())?;
    Ok(Json(state.worlds.query(provider, world_id, version_id).await?))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/installed", get(installed))
        .route("/delete", post(delete))
        .route("/set-active", post(set_active))
        .route("/{world_id}/versions", get(versions))
        .route("/install", post(install))
        .route("/download-status/{download_id}", get(download_status))
        .route("/query", post(query_file))
}
