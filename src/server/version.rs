//! Смена ядра сервера (форк, версия, сборка) и определение текущего ядра.
//!
//! Смена выполняется синхронно в запросе. Остановка, удаление файлов и EULA
//! не прерывают смену, а ошибка получения ссылки или скачивания прерывает.

use async_trait::async_trait;
use mcpanel_core::{AddonError, MinecraftVersion, Result};
use mcpanel_db::ServerVersionStore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use super::eula::accept_eula;
use super::properties::ServerProperties;
use crate::api::mcjars::{McjarsBuild, McjarsClient};
use crate::gateway::{PanelServers, PullOptions, ServerGateway};
use crate::jobs::{stop_server, wipe_server_files, JobTimings};

/// Ядра, у которых сборка выбирается по имени, а не по номеру
const NAME_MATCHED_TYPES: [&str; 5] = ["FABRIC", "FORGE", "NEOFORGE", "SPONGE", "LEGACYFABRIC"];
const JARFILE_VARIABLE: &str = "SERVER_JARFILE";
const LATEST: &str = "latest";

#[async_trait]
pub trait BuildSource: Send + Sync {
    async fn raw_builds(&self, fork: &str, version: &str) -> Result<Vec<McjarsBuild>>;

    /// Скачивает файл ядра сюда, если демон не смог его забрать
    async fn fetch_server_file(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl BuildSource for McjarsClient {
    async fn raw_builds(&self, fork: &str, version: &str) -> Result<Vec<McjarsBuild>> {
        McjarsClient::raw_builds(self, fork, version).await
    }

    async fn fetch_server_file(&self, url: &str) -> Result<Vec<u8>> {
        McjarsClient::download(self, url).await
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRequest {
    #[serde(rename = "type")]
    pub server_type: String,
    pub version: String,
    pub build: String,
    pub build_name: Option<String>,
    #[serde(default)]
    pub delete_files: bool,
    #[serde(default)]
    pub accept_eula: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentVersion {
    pub current: MinecraftVersion,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub warning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Выбранная сборка и откуда её качать
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServerDownload {
    url: String,
    is_zip: bool,
    build_name: String,
}

pub struct VersionService {
    gateway: Arc<dyn ServerGateway>,
    panel: Arc<dyn PanelServers>,
    builds: Arc<dyn BuildSource>,
    store: ServerVersionStore,
    timings: JobTimings,
}

impl VersionService {
    pub fn new(
        gateway: Arc<dyn ServerGateway>,
        panel: Arc<dyn PanelServers>,
        builds: Arc<dyn BuildSource>,
        store: ServerVersionStore,
        timings: JobTimings,
    ) -> Self {
        Self {
            gateway,
            panel,
            builds,
            store,
            timings,
        }
    }

    pub async fn switch(&self, server: &str, request: &SwitchRequest) -> Result<MinecraftVersion> {
        log::info!(
            "Minecraft version change for {}: {} {} build {} (delete files: {}, eula: {})",
            server,
            request.server_type,
            request.version,
            request.build,
            request.delete_files,
            request.accept_eula
        );

        let builds = self
            .builds
            .raw_builds(&request.server_type, &request.version)
            .await
            .map_err(|e| AddonError::Api(format!("Failed to fetch builds from API: {}", e)))?;
        let download = pick_download(&builds, &request.server_type, &request.build)?;
        let build_name = if download.build_name.is_empty() {
            request.build_name.clone().unwrap_or_else(|| request.build.clone())
        } else {
            download.build_name.clone()
        };
        log::info!("Download URL found: {} (zip: {})", download.url, download.is_zip);

        stop_server(self.gateway.as_ref(), server, &self.timings).await;

        if request.delete_files {
            wipe_server_files(self.gateway.as_ref(), server).await;
        } else if let Err(e) = self
            .gateway
            .delete_files(server, "/", &["libraries".to_string()])
            .await
        {
            log::warn!("Failed to delete libraries folder of {}: {}", server, e);
        }

        let filename = if download.is_zip { "server.zip" } else { "server.jar" };
        let options = PullOptions {
            filename: Some(filename.to_string()),
            use_header: request.server_type == "FABRIC",
            foreground: true,
            headers: Default::default(),
        };
        if let Err(e) = self.gateway.pull(server, &download.url, "/", &options).await {
            if request.server_type != "FABRIC" {
                return Err(AddonError::Gateway(format!("Failed to download server: {}", e)));
            }
            log::warn!("Daemon pull of Fabric server failed ({}), downloading it here", e);
            self.upload_server_file(server, &download.url, filename).await?;
        }

        if download.is_zip {
            self.gateway
                .decompress_file(server, "/", filename)
                .await
                .map_err(|e| AddonError::Gateway(format!("Failed to extract zip file: {}", e)))?;
            if let Err(e) = self
                .gateway
                .delete_files(server, "/", &[filename.to_string()])
                .await
            {
                log::warn!("Failed to delete {} after extraction: {}", filename, e);
            }
        }

        if request.accept_eula {
            if let Err(e) = accept_eula(self.gateway.as_ref(), server).await {
                log::warn!("Failed to create eula.txt for {}: {}", server, e);
            }
        }

        self.point_jarfile_at_server_jar(server).await;

        let version = MinecraftVersion::new(&request.server_type, &request.version, build_name);
        self.persist(server, &version).await?;
        log::info!("Minecraft version change for {} completed", server);
        Ok(version)
    }

    async fn upload_server_file(&self, server: &str, url: &str, filename: &str) -> Result<()> {
        let bytes = self
            .builds
            .fetch_server_file(url)
            .await
            .map_err(|e| AddonError::Gateway(format!("Failed to download server: {}", e)))?;
        log::info!("Downloaded {} bytes, uploading as /{}", bytes.len(), filename);
        self.gateway
            .put_content(server, &format!("/{}", filename), bytes)
            .await
            .map_err(|e| AddonError::Gateway(format!("Failed to upload server: {}", e)))
    }

    async fn persist(&self, server: &str, version: &MinecraftVersion) -> Result<()> {
        let store = self.store.clone();
        let server = server.to_string();
        let version = version.clone();
        tokio::task::spawn_blocking(move || store.set(&server, &version)).await?
    }

    async fn stored(&self, server: &str) -> Result<Option<MinecraftVersion>> {
        let store = self.store.clone();
        let server = server.to_string();
        tokio::task::spawn_blocking(move || store.get(&server)).await?
    }

    /// Если у сервера есть переменная SERVER_JARFILE, она должна указывать на server.jar
    async fn point_jarfile_at_server_jar(&self, server: &str) {
        let profile = match self.panel.startup_profile(server).await {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("Failed to read startup variables of {}: {}", server, e);
                return;
            }
        };
        if !profile.environment.contains_key(JARFILE_VARIABLE) {
            return;
        }
        let env = BTreeMap::from([(JARFILE_VARIABLE.to_string(), "server.jar".to_string())]);
        if let Err(e) = self.panel.update_environment(server, &env).await {
            log::warn!("Failed to update {} for {}: {}", JARFILE_VARIABLE, server, e);
        }
    }

    /// Записанное ядро, иначе найденное по файлам, иначе заглушка с предупреждением
    pub async fn current(&self, server: &str) -> Result<CurrentVersion> {
        if let Some(stored) = self.stored(server).await? {
            if !stored.minecraft_type.is_empty()
                && !stored.minecraft_version.is_empty()
                && !stored.minecraft_build.is_empty()
            {
                return Ok(CurrentVersion {
                    current: stored,
                    warning: false,
                    message: None,
                });
            }
        }

        if let Some(detected) = detect_installed(self.gateway.as_ref(), server).await {
            self.persist(server, &detected).await?;
            return Ok(CurrentVersion {
                current: detected,
                warning: false,
                message: None,
            });
        }

        Ok(CurrentVersion {
            current: MinecraftVersion::new("VANILLA", "1.20.4", LATEST),
            warning: true,
            message: Some(
                "Please select one of the Minecraft forks below to install the version you want."
                    .to_string(),
            ),
        })
    }
}

fn pick_download(builds: &[McjarsBuild], server_type: &str, build: &str) -> Result<ServerDownload> {
    let by_name = NAME_MATCHED_TYPES.contains(&server_type.to_uppercase().as_str());
    let selected = builds
        .iter()
        .find(|b| {
            if by_name {
                b.name.as_deref() == Some(build)
            } else {
                b.build_number_str().as_deref() == Some(build)
            }
        })
        .or_else(|| if build == LATEST { builds.first() } else { None });

    let not_found = || AddonError::resolution("mcjars", "Download URL not found for the selected build");
    let selected = selected.ok_or_else(not_found)?;
    let (url, is_zip) = match (&selected.zip_url, &selected.jar_url) {
        (Some(zip), _) if !zip.is_empty() => (zip.clone(), true),
        (_, Some(jar)) if !jar.is_empty() => (jar.clone(), false),
        _ => return Err(not_found()),
    };

    if reqwest::Url::parse(&url).is_err() {
        log::error!("Invalid download URL from mcjars: {}", url);
        return Err(AddonError::Validation("Invalid download URL format".into()));
    }

    Ok(ServerDownload {
        url,
        is_zip,
        build_name: selected
            .name
            .clone()
            .unwrap_or_else(|| format!("Build {}", build)),
    })
}

/// Угадывает ядро по version.json, motd и именам jar-файлов
pub async fn detect_installed(gateway: &dyn ServerGateway, server: &str) -> Option<MinecraftVersion> {
    static VERSION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\d+\.\d+(\.\d+)?)").expect("valid version regex"));

    if let Ok(raw) = gateway.get_content(server, "/version.json").await {
        let name = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string));
        if let Some(name) = name {
            return Some(MinecraftVersion::new("VANILLA", name, LATEST));
        }
    }

    if let Ok(raw) = gateway.get_content(server, "/server.properties").await {
        let props = ServerProperties::parse(&raw);
        if let Some(found) = props.motd().and_then(|m| VERSION_RE.captures(m)) {
            return Some(MinecraftVersion::new("UNKNOWN", &found[1], "unknown"));
        }
    }

    let entries = gateway.get_directory(server, "/").await.ok()?;
    entries.iter().filter(|e| e.is_jar()).find_map(|jar| {
        let name = jar.name.to_lowercase();
        let fork = ["paper", "spigot", "forge", "fabric"]
            .into_iter()
            .find(|fork| name.contains(fork))?;
        let version = VERSION_RE
            .captures(&name)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Some(MinecraftVersion::new(fork.to_uppercase(), version, "unknown"))
    })
}
