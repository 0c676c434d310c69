//! Датапаки и ресурспаки VanillaTweaks.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use mcpanel_core::PackType;
use serde::{Deserialize, Serialize};

use super::content::start;
use super::{required, ApiError, ApiResult, SharedState, Started};
use crate::jobs::{InstallJob, JobRequest};
use crate::server::WorldEntry;

const DEFAULT_VERSION: &str = "1.21";
const DEFAULT_WORLD: &str = "world";

#[derive(Debug, Default, Deserialize)]
pub struct PackQuery {
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub pack_type: Option<String>,
    pub pack: Option<String>,
}

impl PackQuery {
    fn version(&self) -> &str {
        self.version.as_deref().filter(|v| !v.is_empty()).unwrap_or(DEFAULT_VERSION)
    }
}

#[derive(Debug, Deserialize)]
pub struct InstallBody {
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub pack_type: Option<String>,
    pub packs: Option<serde_json::Map<String, serde_json::Value>>,
    pub world: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectedVersion {
    pub version: Option<String>,
}

fn parse_pack_type(raw: Option<&str>) -> ApiResult<PackType> {
    match raw.filter(|t| !t.is_empty()) {
        None => Ok(PackType::Datapacks),
        Some(raw) => PackType::parse(raw).ok_or_else(|| ApiError::validation("The selected type is invalid.")),
    }
}

async fn index(
    State(state): State<SharedState>,
    Query(query): Query<PackQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let pack_type = parse_pack_type(query.pack_type.as_deref())?;
    Ok(Json(state.vanillatweaks.packs(query.version(), pack_type).await))
}

async fn versions(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.vanillatweaks.versions().await)
}

/// Прокси иконки пака
async fn image(
    State(state): State<SharedState>,
    Query(query): Query<PackQuery>,
) -> ApiResult<impl IntoResponse> {
    let pack = required("pack", query.pack.as_deref())?;
    let pack_type = PackType::parse(query.pack_type.as_deref().unwrap_or_default()).unwrap_or(PackType::Datapacks);
    let bytes = state.vanillatweaks.image(query.version(), pack_type, pack).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        bytes,
    ))
}

async fn install(
    State(state): State<SharedState>,
    Path(server): Path<String>,
    body: Result<Json<InstallBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Started>)> {
    let Json(body) = body?;
    let version = required("version", body.version.as_deref())?.to_string();
    let pack_type = PackType::parse(required("type", body.pack_type.as_deref())?)
        .ok_or_else(|| ApiError::validation("The selected type is invalid."))?;
    let packs = body
        .packs
        .ok_or_else(|| ApiError::validation("The packs field is required."))?;
    let world = body
        .world
        .filter(|w| !w.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_WORLD.to_string());

    let job = InstallJob::new(
        server,
        JobRequest::Datapack {
            version,
            pack_type,
            packs,
            world,
        },
    );
    start(&state, job, "Pack installation started").await
}

async fn detect_version(State(state): State<SharedState>, Path(server): Path<String>) -> Json<DetectedVersion> {
    Json(DetectedVersion {
        version: state.worlds.detect_version(&server).await,
    })
}

async fn worlds(State(state): State<SharedState>, Path(server): Path<String>) -> Json<Vec<WorldEntry>> {
    Json(state.worlds.datapack_worlds(&server).await)
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/versions", get(versions))
        .route("/image", get(image))
        .route("/install", post(install))
        .route("/detect-version", get(detect_version))
        .route("/worlds", get(worlds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ProviderRegistry;
    use crate::gateway::testing::{FakeGateway, FakePanel};
    use crate::http::testing::{app, wait_for_job};
    use serde_json::json;

    fn tree() -> FakeGateway {
        FakeGateway::new()
            .with_dir("versions/1.20.4")
            .with_dir("world/datapacks")
            .with_file("world/level.dat", "nbt")
            .with_dir("logs")
    }

    #[test]
    fn test_pack_type_defaults() {
        assert_eq!(parse_pack_type(None).unwrap(), PackType::Datapacks);
        assert_eq!(parse_pack_type(Some("resourcepacks")).unwrap(), PackType::Resourcepacks);
        assert!(parse_pack_type(Some("shaders")).is_err());
    }

    #[tokio::test]
    async fn test_detect_version_and_worlds() {
        let app = app(tree(), FakePanel::new(1), ProviderRegistry::new());
        let (status, body) = app.get("/api/servers/srv/minecraft/datapacks/detect-version").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"version": "1.20"}));

        let (_, body) = app.get("/api/servers/srv/minecraft/datapacks/worlds").await;
        assert_eq!(body, json!([{"name": "world"}]));
    }

    #[tokio::test]
    async fn test_install_into_default_world() {
        let app = app(tree(), FakePanel::new(1), ProviderRegistry::new());
        let body = json!({
            "version": "1.20",
            "type": "datapacks",
            "packs": {"survival": ["graves"]},
        });
        let (status, started) = app.post("/api/servers/srv/minecraft/datapacks/install", body).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let id = started["download_id"].as_str().unwrap().to_string();

        let record = wait_for_job(&app, "srv", &id).await;
        assert_eq!(record["status"], "completed");
        assert_eq!(record["decompressed"], true);
        assert!(app.gateway.called("decompress /world/datapacks"));
    }

    #[tokio::test]
    async fn test_install_validation() {
        let app = app(tree(), FakePanel::new(1), ProviderRegistry::new());
        let (status, _) = app
            .post(
                "/api/servers/srv/minecraft/datapacks/install",
                json!({"version": "1.20", "type": "shaders", "packs": {}}),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = app
            .post("/api/servers/srv/minecraft/datapacks/install", json!({"version": "1.20", "type": "datapacks"}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = app.get("/api/servers/srv/minecraft/datapacks/image?version=1.20").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
