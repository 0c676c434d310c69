//! Каталоги модов, плагинов и модпаков.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mcpanel_core::{
    AddonError, ContentItem, ContentKind, ContentVersion, HistoryEntry, HistoryRecord, ProviderKind,
};
use mcpanel_db::RECENT_LIMIT;
use serde::Deserialize;

use super::{
    required, ApiError, ApiResult, CatalogQuery, ListResponse, PaginationMeta, ProviderQuery,
    SharedState, Started,
};
use crate::api::SearchQuery;
use crate::jobs::{InstallJob, JobRequest};

// ============================================================================
// Shared catalog handlers
// ============================================================================

/// Страница каталога раздела
pub(crate) async fn search_catalog(
    state: &SharedState,
    domain: ContentKind,
    query: &CatalogQuery,
) -> ApiResult<Json<ListResponse<ContentItem, PaginationMeta>>> {
    let provider = state.registry.get(domain, query.provider()?)?;
    let (page, page_size) = query.pagination()?;

    let search = SearchQuery::new(query.search_query.clone().unwrap_or_default(), page_size, page)
        .with_minecraft_version(query.minecraft_version.clone())
        .with_loader(query.loader.clone());
    let result = provider.search(&search).await;

    let meta = PaginationMeta::new(result.total, result.items.len(), page_size, page);
    Ok(Json(ListResponse::with_meta(result.items, meta)))
}

pub(crate) async fn list_versions(
    state: &SharedState,
    domain: ContentKind,
    item_id: &str,
    query: &ProviderQuery,
) -> ApiResult<Json<ListResponse<ContentVersion>>> {
    let provider = state
        .registry
        .get(domain, required("provider", query.provider.as_deref())?)?;
    Ok(Json(ListResponse::plain(provider.versions(item_id).await)))
}

/// Селектор площадки, проверенный по реестру раздела
pub(crate) fn provider_for(state: &SharedState, domain: ContentKind, selector: Option<&str>) -> ApiResult<ProviderKind> {
    let provider = state.registry.get(domain, required("provider", selector)?)?;
    Ok(provider.kind())
}

pub(crate) async fn start(state: &SharedState, job: InstallJob, message: &'static str) -> ApiResult<(StatusCode, Json<Started>)> {
    let download_id = state.queue.enqueue(job).await?;
    Ok((StatusCode::ACCEPTED, Json(Started { download_id, message })))
}

fn catalog_routes(domain: ContentKind) -> Router<SharedState> {
    Router::new()
        .route(
            "/",
            get(move |State(state): State<SharedState>, Query(query): Query<CatalogQuery>| async move {
                search_catalog(&state, domain, &query).await
            }),
        )
        .route(
            "/{item_id}/versions",
            get(
                move |State(state): State<SharedState>,
                      Path((_server, item_id)): Path<(String, String)>,
                      Query(query): Query<ProviderQuery>| async move {
                    list_versions(&state, domain, &item_id, &query).await
                },
            ),
        )
}

// ============================================================================
// Mods & plugins
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ModInstallBody {
    pub provider: Option<String>,
    pub mod_id: Option<String>,
    pub version_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PluginInstallBody {
    pub provider: Option<String>,
    pub plugin_id: Option<String>,
    pub version_id: Option<String>,
}

async fn install_content(
    state: &SharedState,
    server: String,
    domain: ContentKind,
    provider: Option<&str>,
    item_field: &str,
    item_id: Option<&str>,
    version_id: Option<&str>,
) -> ApiResult<(StatusCode, Json<Started>)> {
    let provider = provider_for(state, domain, provider)?;
    let item_id = required(item_field, item_id)?.to_string();
    let version_id = required("version_id", version_id)?.to_string();

    let job = InstallJob::new(
        server,
        JobRequest::Content {
            domain,
            provider,
            item_id,
            version_id,
        },
    );
    start(state, job, "Installation started").await
}

async fn install_mod(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<ModInstallBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Started>)> {
    let Json(body) = body?;
    install_content(
        &state,
        server,
        ContentKind::Mod,
        body.provider.as_deref(),
        "mod_id",
        body.mod_id.as_deref(),
        body.version_id.as_deref(),
    )
    .await
}

async fn install_plugin(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<PluginInstallBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Started>)> {
    let Json(body) = body?;
    install_content(
        &state,
        server,
        ContentKind::Plugin,
        body.provider.as_deref(),
        "plugin_id",
        body.plugin_id.as_deref(),
        body.version_id.as_deref(),
    )
    .await
}

pub fn mod_routes() -> Router<SharedState> {
    catalog_routes(ContentKind::Mod).route("/install", post(install_mod))
}

pub fn plugin_routes() -> Router<SharedState> {
    catalog_routes(ContentKind::Plugin).route("/install", post(install_plugin))
}

// ============================================================================
// Modpacks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ModpackInstallBody {
    pub provider: Option<String>,
    pub modpack_id: Option<String>,
    pub modpack_version_id: Option<String>,
    pub delete_server_files: Option<bool>,
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

async fn recent_modpacks(
    State(state): State<SharedState>,
    Path(server): Path<String>,
) -> ApiResult<Json<ListResponse<HistoryRecord>>> {
    let history = state.history.clone();
    let records = tokio::task::spawn_blocking(move || history.recent(&server, RECENT_LIMIT)).await??;
    Ok(Json(ListResponse::plain(records)))
}

/// Ставит установку модпака: проверки, запись в историю, очередь
async fn install_modpack(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<ModpackInstallBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Started>)> {
    let Json(body) = body?;
    let installer_egg = state.installer_egg.ok_or_else(|| {
        ApiError(AddonError::InvalidConfig("Modpack installer egg is not configured".into()))
    })?;

    let profile = state.panel.startup_profile(&server).await?;
    if profile.egg_id == installer_egg {
        return Err(ApiError(AddonError::Conflict(
            "Already processing a modpack installation job.".into(),
        )));
    }

    let provider = provider_for(&state, ContentKind::Modpack, body.provider.as_deref())?;
    let modpack_id = required("modpack_id", body.modpack_id.as_deref())?.to_string();
    let version_id = required("modpack_version_id", body.modpack_version_id.as_deref())?.to_string();
    let delete_server_files = body
        .delete_server_files
        .ok_or_else(|| ApiError::validation("The delete server files field is required."))?;
    let name = required("name", body.name.as_deref())?.to_string();

    let entry = HistoryEntry {
        server_id: server.clone(),
        provider,
        modpack_id: modpack_id.clone(),
        name,
        version_id: version_id.clone(),
        icon_url: body.icon_url.filter(|url| !url.is_empty()),
    };
    let history = state.history.clone();
    tokio::task::spawn_blocking(move || history.upsert(&entry)).await??;

    let job = InstallJob::new(
        server,
        JobRequest::Modpack {
            provider,
            modpack_id,
            version_id,
            delete_server_files,
            installer_egg,
            curseforge_api_key: state.curseforge_api_key.clone(),
        },
    );
    start(&state, job, "Modpack installation started").await
}

pub fn modpack_routes() -> Router<SharedState> {
    catalog_routes(ContentKind::Modpack)
        .route("/recent", get(recent_modpacks))
        .route("/install", post(install_modpack))
}
