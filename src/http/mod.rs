//! HTTP API под `/api/servers/{server}/minecraft`.
//!
//! Аутентификация и права остаются на стороне панели.

pub mod configs;
pub mod content;
pub mod datapacks;
pub mod error;
pub mod versions;
pub mod worlds;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use mcpanel_core::ProgressRecord;
use mcpanel_db::HistoryLedger;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::mcjars::McjarsClient;
use crate::api::vanillatweaks::VanillaTweaksClient;
use crate::api::ProviderRegistry;
use crate::configs::ConfigService;
use crate::gateway::{PanelServers, ServerGateway};
use crate::jobs::{progress_key_for, JobQueue};
use crate::progress::ProgressStore;
use crate::server::{VersionService, WorldService};
use crate::utils::total_pages;
pub use error::{ApiError, ApiResult};

pub const MAX_PAGE_SIZE: u32 = 50;

/// Всё, что нужно обработчикам
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub gateway: Arc<dyn ServerGateway>,
    pub panel: Arc<dyn PanelServers>,
    pub queue: JobQueue,
    pub progress: Arc<dyn ProgressStore>,
    pub history: HistoryLedger,
    pub configs: ConfigService,
    pub worlds: WorldService,
    pub versions: VersionService,
    pub mcjars: McjarsClient,
    pub vanillatweaks: VanillaTweaksClient,
    /// Egg установщика модпаков, `None` если не настроен
    pub installer_egg: Option<u64>,
    pub curseforge_api_key: String,
}

pub type SharedState = Arc<AppState>;

/// Ответ-список в формате панели
#[derive(Debug, Serialize)]
pub struct ListResponse<T, M = ()> {
    pub object: &'static str,
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<M>,
}

impl<T> ListResponse<T> {
    pub fn plain(data: Vec<T>) -> Self {
        Self {
            object: "list",
            data,
            meta: None,
        }
    }
}

impl<T, M> ListResponse<T, M> {
    pub fn with_meta(data: Vec<T>, meta: M) -> Self {
        Self {
            object: "list",
            data,
            meta: Some(meta),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub count: usize,
    pub per_page: u32,
    pub current_page: u32,
    pub total_pages: u64,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub pagination: Pagination,
}

impl PaginationMeta {
    pub fn new(total: u64, count: usize, per_page: u32, current_page: u32) -> Self {
        Self {
            pagination: Pagination {
                total,
                count,
                per_page,
                current_page,
                total_pages: total_pages(total, per_page),
                links: Vec::new(),
            },
        }
    }
}

/// Параметры каталога. Числа приходят строками, чтобы ошибки были 422, а не 400.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub provider: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search_query: Option<String>,
    pub minecraft_version: Option<String>,
    pub loader: Option<String>,
}

impl CatalogQuery {
    /// `page >= 1`, `1 <= page_size <= 50`
    pub fn pagination(&self) -> ApiResult<(u32, u32)> {
        let page = parse_number("page", self.page.as_deref())?;
        let page_size = parse_number("page_size", self.page_size.as_deref())?;
        if page < 1 {
            return Err(ApiError::validation("The page field must be at least 1."));
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(ApiError::validation(format!(
                "The page size field must be between 1 and {}.",
                MAX_PAGE_SIZE
            )));
        }
        Ok((page, page_size))
    }

    pub fn provider(&self) -> ApiResult<&str> {
        required("provider", self.provider.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderQuery {
    pub provider: Option<String>,
}

fn parse_number(field: &str, value: Option<&str>) -> ApiResult<u32> {
    let value = required(field, value)?;
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ApiError::validation(format!("The {} field must be an integer.", field)))
}

pub(crate) fn required<'a>(field: &str, value: Option<&'a str>) -> ApiResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::validation(format!("The {} field is required.", field))),
    }
}

/// Ответ на запуск фоновой установки
#[derive(Debug, Serialize)]
pub struct Started {
    pub download_id: String,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// Статус любой фоновой задачи
async fn job_status(
    State(state): State<SharedState>,
    Path((_server, job_id)): Path<(String, String)>,
) -> ApiResult<Json<ProgressRecord>> {
    state
        .progress
        .get(&progress_key_for(&job_id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError(mcpanel_core::AddonError::NotFound(format!("job {}", job_id))))
}

pub fn router(state: SharedState) -> Router {
    let minecraft = Router::new()
        .nest("/mods", content::mod_routes())
        .nest("/plugins", content::plugin_routes())
        .nest("/modpacks", content::modpack_routes())
        .nest("/datapacks", datapacks::routes())
        .nest("/worlds", worlds::routes())
        .nest("/versions", versions::routes())
        .nest("/configs", configs::routes())
        .route("/icon", post(configs::upload_icon))
        .route("/jobs/{job_id}", get(job_status));

    Router::new()
        .nest("/api/servers/{server}/minecraft", minecraft)
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::gateway::testing::{FakeGateway, FakePanel};
    use axum::http::StatusCode;

    #[test]
    fn test_pagination_rules() {
        let query = |page: &str, size: &str| CatalogQuery {
            page: Some(page.into()),
            page_size: Some(size.into()),
            ..Default::default()
        };
        assert_eq!(query("2", "20").pagination().unwrap(), (2, 20));
        assert!(query("0", "20").pagination().is_err());
        assert!(query("1", "51").pagination().is_err());
        assert!(query("1", "0").pagination().is_err());
        assert!(query("one", "20").pagination().is_err());
        assert!(CatalogQuery::default().pagination().is_err());
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(45, 20, 20, 1);
        assert_eq!(meta.pagination.total_pages, 3);
        assert_eq!(PaginationMeta::new(0, 0, 20, 1).pagination.total_pages, 1);
        let value = serde_json::to_value(ListResponse::with_meta(vec![1, 2], meta)).unwrap();
        assert_eq!(value["object"], "list");
        assert_eq!(value["meta"]["pagination"]["links"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let app = app(FakeGateway::new(), FakePanel::new(1), ProviderRegistry::new());
        let (status, body) = app.get("/api/servers/srv/minecraft/jobs/mod_missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
