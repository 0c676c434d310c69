//! Миры и датапаки на файловой системе сервера.

use futures::future::join_all;
use mcpanel_core::{AddonError, ContentKind, ProviderKind, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};

use super::properties::{load_properties, save_properties, ServerProperties, DEFAULT_LEVEL_NAME};
use crate::api::cache::ApiCache;
use crate::api::ProviderRegistry;
use crate::gateway::{FileEntry, ServerGateway};
use crate::redirect::{probe_remote_file, HeadProbe, RemoteFileInfo};

/// Корневые каталоги, которые точно не миры
const NON_WORLD_DIRS: [&str; 14] = [
    "libraries",
    "versions",
    "logs",
    "crash-reports",
    "plugins",
    "mods",
    "config",
    "cache",
    "bundler",
    "web",
    ".fabric",
    "debug",
    "webeditor",
    ".mixin.out",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldEntry {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledWorlds {
    pub worlds: Vec<WorldEntry>,
    pub active_world: String,
}

pub struct WorldService {
    gateway: Arc<dyn ServerGateway>,
    registry: Arc<ProviderRegistry>,
    probe: Arc<dyn HeadProbe>,
    cache: ApiCache,
}

impl WorldService {
    pub fn new(
        gateway: Arc<dyn ServerGateway>,
        registry: Arc<ProviderRegistry>,
        probe: Arc<dyn HeadProbe>,
        cache: ApiCache,
    ) -> Self {
        Self {
            gateway,
            registry,
            probe,
            cache,
        }
    }

    /// Каталоги в корне, в которых есть `level.dat`
    pub async fn installed(&self, server: &str) -> InstalledWorlds {
        let root = match self.gateway.get_directory(server, "/").await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to list root of {}: {}", server, e);
                return InstalledWorlds {
                    worlds: Vec::new(),
                    active_world: "unknown".to_string(),
                };
            }
        };

        let candidates: Vec<&FileEntry> = root
            .iter()
            .filter(|e| e.is_directory())
            .filter(|e| !e.name.starts_with('.') && !NON_WORLD_DIRS.contains(&e.name.as_str()))
            .collect();
        let worlds = self
            .dirs_containing(server, &candidates, "level.dat")
            .await
            .into_iter()
            .map(|name| WorldEntry { name })
            .collect();

        let active_world = match load_properties(self.gateway.as_ref(), server).await {
            Ok(props) => props.level_name(),
            Err(_) => DEFAULT_LEVEL_NAME.to_string(),
        };

        InstalledWorlds {
            worlds,
            active_world,
        }
    }

    pub async fn delete(&self, server: &str, name: &str) -> Result<()> {
        let name = validate_world_name(name)?;
        self.gateway
            .delete_files(server, "/", &[name.to_string()])
            .await?;
        log::info!("Deleted world {} on server {}", name, server);
        Ok(())
    }

    /// Прописывает `level-name` в server.properties
    pub async fn set_active(&self, server: &str, name: &str) -> Result<()> {
        let name = validate_world_name(name)?;
        let mut props = match load_properties(self.gateway.as_ref(), server).await {
            Ok(props) => props,
            Err(AddonError::NotFound(_)) => ServerProperties::default(),
            Err(e) => return Err(e),
        };
        props.set("level-name", name);
        save_properties(self.gateway.as_ref(), server, &props)
            .await
            .map_err(|e| AddonError::Gateway(format!("Failed to update server.properties: {}", e)))
    }

    /// Миры, у которых есть каталог `datapacks`
    pub async fn datapack_worlds(&self, server: &str) -> Vec<WorldEntry> {
        let root = match self.gateway.get_directory(server, "/").await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to list root of {}: {}", server, e);
                return Vec::new();
            }
        };
        let dirs: Vec<&FileEntry> = root.iter().filter(|e| e.is_directory()).collect();
        self.dirs_containing(server, &dirs, "datapacks")
            .await
            .into_iter()
            .map(|name| WorldEntry { name })
            .collect()
    }

    /// Версия Minecraft по каталогу `/versions`
    pub async fn detect_version(&self, server: &str) -> Option<String> {
        static VERSION_DIR_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^(\d+\.\d+)").expect("valid version dir regex"));
        let entries = self.gateway.get_directory(server, "/versions").await.ok()?;
        entries
            .iter()
            .find_map(|e| VERSION_DIR_RE.captures(&e.name).map(|c| c[1].to_string()))
    }

    /// Имя и размер архива мира до установки
    pub async fn query(
        &self,
        provider: ProviderKind,
        world_id: &str,
        version_id: &str,
    ) -> Result<RemoteFileInfo> {
        let spec = self
            .registry
            .resolve(ContentKind::World, provider)?
            .get_download_url(world_id, version_id)
            .await?;
        probe_remote_file(self.probe.as_ref(), &self.cache, &spec).await
    }

    async fn dirs_containing(&self, server: &str, dirs: &[&FileEntry], child: &str) -> Vec<String> {
        let checks = dirs.iter().map(|dir| async move {
            match self.gateway.get_directory(server, &format!("/{}", dir.name)).await {
                Ok(entries) if entries.iter().any(|e| e.name == child) => Some(dir.name.clone()),
                Ok(_) => None,
                Err(e) => {
                    log::debug!("Skipping {} while looking for {}: {}", dir.name, child, e);
                    None
                }
            }
        });
        join_all(checks).await.into_iter().flatten().collect()
    }
}

fn validate_world_name(name: &str) -> Result<&str> {
    let name = name.trim().trim_matches('/');
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(AddonError::Validation("The name field is invalid.".into()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::StaticProvider;
    use crate::gateway::testing::FakeGateway;
    use crate::redirect::testing::ScriptedProbe;
    use mcpanel_core::DownloadSpec;

    fn service(gw: Arc<FakeGateway>, registry: ProviderRegistry, probe: ScriptedProbe) -> WorldService {
        WorldService::new(gw, Arc::new(registry), Arc::new(probe), ApiCache::new(16))
    }

    fn server_tree() -> FakeGateway {
        FakeGateway::new()
            .with_file("world/level.dat", "nbt")
            .with_file("world/datapacks/graves.zip", "zip")
            .with_file("skyblock/level.dat", "nbt")
            .with_file("plugins/level.dat", "odd")
            .with_file(".hidden/level.dat", "nbt")
            .with_dir("logs")
            .with_file("server.properties", "motd=hi\nlevel-name=skyblock\n")
    }

    #[tokio::test]
    async fn test_installed_worlds() {
        let gw = Arc::new(server_tree());
        let worlds = service(gw, ProviderRegistry::new(), ScriptedProbe::default())
            .installed("srv")
            .await;

        let names: Vec<&str> = worlds.worlds.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["skyblock", "world"]);
        assert_eq!(worlds.active_world, "skyblock");
    }

    #[tokio::test]
    async fn test_installed_when_listing_fails() {
        let gw = Arc::new(FakeGateway::new().failing_on("list"));
        let worlds = service(gw, ProviderRegistry::new(), ScriptedProbe::default())
            .installed("srv")
            .await;
        assert!(worlds.worlds.is_empty());
        assert_eq!(worlds.active_world, "unknown");
    }

    #[tokio::test]
    async fn test_set_active_appends_or_rewrites() {
        let gw = Arc::new(FakeGateway::new().with_file("server.properties", "#props\nmotd=hi\n"));
        let svc = service(gw.clone(), ProviderRegistry::new(), ScriptedProbe::default());

        svc.set_active("srv", "skyblock").await.unwrap();
        assert_eq!(gw.content("server.properties").unwrap(), "#props\nmotd=hi\nlevel-name=skyblock\n");

        svc.set_active("srv", "world").await.unwrap();
        assert_eq!(gw.content("server.properties").unwrap(), "#props\nmotd=hi\nlevel-name=world\n");
    }

    #[tokio::test]
    async fn test_delete_rejects_traversal() {
        let gw = Arc::new(server_tree());
        let svc = service(gw.clone(), ProviderRegistry::new(), ScriptedProbe::default());

        assert!(matches!(svc.delete("srv", "../etc").await, Err(AddonError::Validation(_))));
        svc.delete("srv", "skyblock").await.unwrap();
        assert!(!gw.has("skyblock"));
        assert!(gw.has("world/level.dat"));
    }

    #[tokio::test]
    async fn test_datapack_worlds_and_version() {
        let gw = Arc::new(server_tree().with_dir("versions/1.21.1").with_dir("versions/.cache"));
        let svc = service(gw, ProviderRegistry::new(), ScriptedProbe::default());

        let worlds = svc.datapack_worlds("srv").await;
        assert_eq!(worlds, vec![WorldEntry { name: "world".into() }]);
        assert_eq!(svc.detect_version("srv").await.as_deref(), Some("1.21"));
    }

    #[tokio::test]
    async fn test_query_uses_disposition() {
        let url = "https://www.curseforge.com/api/v1/mods/1/files/2/download";
        let cdn = "https://mediafilez.forgecdn.net/files/2/Sky%20Block.zip";
        let mut provider = StaticProvider::serving(ProviderKind::CurseForge, url);
        provider.download = Ok(DownloadSpec::direct(url).with_filename("world_1_2.zip"));
        let mut registry = ProviderRegistry::new();
        registry.register(ContentKind::World, Arc::new(provider));
        let probe = ScriptedProbe::default()
            .redirect(url, cdn)
            .file(cdn, Some("attachment; filename=\"Sky Block.zip\""), 52_000_000);

        let info = service(Arc::new(FakeGateway::new()), registry, probe)
            .query(ProviderKind::CurseForge, "1", "2")
            .await
            .unwrap();
        assert_eq!(info.filename, "Sky Block.zip");
        assert_eq!(info.size, 52_000_000);
    }
}
