use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use mcpanel_core::{AddonError, MinecraftVersion};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{ApiError, ApiResult, SharedState};
use crate::api::mcjars::{BuildSummary, Fork, ForkVersion};
use crate::server::{CurrentVersion, SwitchRequest};

#[derive(Debug, Serialize)]
pub struct ForksResponse {
    pub success: bool,
    pub forks: BTreeMap<String, Fork>,
}

#[derive(Debug, Serialize)]
pub struct VersionsResponse {
    pub success: bool,
    pub versions: BTreeMap<String, ForkVersion>,
}

#[derive(Debug, Serialize)]
pub struct BuildsResponse {
    pub success: bool,
    pub builds: Vec<BuildSummary>,
}

#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub success: bool,
    pub version: MinecraftVersion,
}

#[derive(Debug, Serialize)]
pub struct CurrentResponse {
    pub success: bool,
    #[serde(flatten)]
    pub current: CurrentVersion,
}

fn upstream(what: &str, err: AddonError) -> ApiError {
    log::error!("mcjars {} request failed: {}", what, err);
    ApiError(AddonError::Api(format!("Failed to fetch {} from API", what)))
}

async fn forks(State(state): State<SharedState>) -> ApiResult<Json<ForksResponse>> {
    let forks = state
        .mcjars
        .forks()
        .await
        .map_err(|e| upstream("Minecraft forks", e))?;
    Ok(Json(ForksResponse { success: true, forks }))
}

async fn versions(
    State(state): State<SharedState>,
    Path((_server, fork)): Path<(String, String)>,
) -> ApiResult<Json<VersionsResponse>> {
    let versions = state
        .mcjars
        .versions(&fork)
        .await
        .map_err(|e| upstream("versions", e))?;
    Ok(Json(VersionsResponse {
        success: true,
        versions,
    }))
}

async fn builds(
    State(state): State<SharedState>,
    Path((_server, fork, version)): Path<(String, String, String)>,
) -> ApiResult<Json<BuildsResponse>> {
    let builds = state
        .mcjars
        .builds(&fork, &version)
        .await
        .map_err(|e| upstream("builds", e))?;
    Ok(Json(BuildsResponse { success: true, builds }))
}

/// Смена ядра выполняется в запросе целиком
async fn install(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<SwitchRequest>, JsonRejection>,
) -> ApiResult<Json<SwitchResponse>> {
    let Json(request) = body?;
    if request.server_type.trim().is_empty() || request.version.trim().is_empty() || request.build.trim().is_empty() {
        return Err(ApiError::validation("The type, version and build fields are required."));
    }
    let version = state.versions.switch(&server, &request).await?;
    Ok(Json(SwitchResponse {
        success: true,
        version,
    }))
}

async fn current(
    State(state): State<SharedState>,
    Path(server): Path<String>,
) -> ApiResult<Json<CurrentResponse>> {
    let current = state.versions.current(&server).await?;
    Ok(Json(CurrentResponse { success: true, current }))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/forks", get(forks))
        .route("/versions/{fork}", get(versions))
        .route("/builds/{fork}/{version}", get(builds))
        .route("/install", post(install))
        .route("/current", get(current))
}
