//! Редактор конфигов сервера: чтение всех известных файлов и сохранение правок.

pub mod catalog;
pub mod codec;

use futures::future::join_all;
use mcpanel_core::{AddonError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::gateway::{root_file_names, ServerGateway};
pub use catalog::{ConfigCatalog, ConfigEntry};
pub use codec::FlatMap;

/// Файл из каталога вместе с содержимым
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigDocument {
    #[serde(flatten)]
    pub entry: ConfigEntry,
    pub content: Option<FlatMap>,
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRequest {
    pub file: String,
    #[serde(default)]
    pub contents: Option<FlatMap>,
    #[serde(default)]
    pub raw_content: Option<String>,
}

#[derive(Clone)]
pub struct ConfigService {
    gateway: Arc<dyn ServerGateway>,
    catalog: Arc<ConfigCatalog>,
}

impl ConfigService {
    pub fn new(gateway: Arc<dyn ServerGateway>, catalog: ConfigCatalog) -> Self {
        Self {
            gateway,
            catalog: Arc::new(catalog),
        }
    }

    /// Все файлы каталога. Файлы из корня, которых нет в листинге, не запрашиваются.
    pub async fn list(&self, server: &str) -> Vec<ConfigDocument> {
        let root = match root_file_names(self.gateway.as_ref(), server).await {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Failed to list root of {}: {}", server, e);
                Vec::new()
            }
        };

        let fetches = self.catalog.entries().iter().map(|entry| {
            let root = &root;
            async move {
                let in_subdir = entry.file.contains('/');
                if !in_subdir && !root.iter().any(|name| name == entry.file) {
                    return ConfigDocument {
                        entry: *entry,
                        content: None,
                        raw: None,
                    };
                }

                match self.gateway.get_content(server, entry.file).await {
                    Ok(raw) => ConfigDocument {
                        entry: *entry,
                        content: codec::parse(entry.format, &raw),
                        raw: Some(raw),
                    },
                    Err(e) => {
                        log::debug!("Config {} not readable on {}: {}", entry.file, server, e);
                        ConfigDocument {
                            entry: *entry,
                            content: None,
                            raw: None,
                        }
                    }
                }
            }
        });

        join_all(fetches).await
    }

    /// Сохраняет файл. Сырой текст имеет приоритет над картой значений.
    pub async fn save(&self, server: &str, request: &SaveRequest) -> Result<()> {
        let entry = self
            .catalog
            .find(&request.file)
            .ok_or_else(|| AddonError::Validation("Invalid file".into()))?;

        let content = match &request.raw_content {
            Some(raw) => Some(raw.clone()),
            None => {
                let flat = request.contents.clone().unwrap_or_default();
                codec::serialize(entry.format, &codec::unflatten(&flat))
            }
        };
        let content = content.ok_or_else(|| AddonError::Validation("Invalid format".into()))?;

        self.gateway
            .put_content(server, entry.file, content.into_bytes())
            .await?;
        log::info!("Updated {} on server {} via config editor", entry.file, server);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::FakeGateway;
    use serde_json::json;

    fn service(gw: Arc<FakeGateway>) -> ConfigService {
        ConfigService::new(gw, ConfigCatalog::minecraft())
    }

    #[tokio::test]
    async fn test_list_skips_absent_root_files() {
        let gw = Arc::new(
            FakeGateway::new()
                .with_file("server.properties", "motd=Hi\nmax-players=10")
                .with_file("config/paper-global.yml", "chunk-system:\n  io-threads: -1\n")
                .with_file("config/canvas-server.json5", "{ a: 1 }"),
        );
        let docs = service(gw.clone()).list("srv").await;
        assert_eq!(docs.len(), 27);

        let props = docs.iter().find(|d| d.entry.file == "server.properties").unwrap();
        assert_eq!(props.content.as_ref().unwrap()["max-players"], json!("10"));

        let paper = docs.iter().find(|d| d.entry.file == "config/paper-global.yml").unwrap();
        assert_eq!(paper.content.as_ref().unwrap()["chunk-system.io-threads"], json!(-1));

        let canvas = docs.iter().find(|d| d.entry.file == "config/canvas-server.json5").unwrap();
        assert_eq!(canvas.content, Some(FlatMap::new()));
        assert_eq!(canvas.raw.as_deref(), Some("{ a: 1 }"));

        // spigot.yml нет в корне: его не запрашивают
        assert!(!gw.calls().iter().any(|c| c == "read spigot.yml"));
        // файлы в подкаталогах запрашиваются всегда
        assert!(gw.called("read config/neoforge-server.toml"));
    }

    #[tokio::test]
    async fn test_save_flat_contents() {
        let gw = Arc::new(FakeGateway::new());
        let mut contents = FlatMap::new();
        contents.insert("motd".into(), json!("Welcome"));
        contents.insert("white-list".into(), json!(true));

        service(gw.clone())
            .save(
                "srv",
                &SaveRequest {
                    file: "server.properties".into(),
                    contents: Some(contents),
                    raw_content: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(gw.content("server.properties").unwrap(), "motd=Welcome\nwhite-list=true");
    }

    #[tokio::test]
    async fn test_save_errors() {
        let gw = Arc::new(FakeGateway::new());
        let svc = service(gw.clone());

        let err = svc
            .save("srv", &SaveRequest { file: "eula.txt".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Invalid file");

        let mut contents = FlatMap::new();
        contents.insert("a".into(), json!(1));
        let err = svc
            .save(
                "srv",
                &SaveRequest {
                    file: "arclight.conf".into(),
                    contents: Some(contents),
                    raw_content: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Invalid format");
        assert!(!gw.called("write"));

        // сырой текст сохраняется для любого формата
        svc.save(
            "srv",
            &SaveRequest {
                file: "arclight.conf".into(),
                contents: None,
                raw_content: Some("optimization { }".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(gw.content("arclight.conf").unwrap(), "optimization { }");
    }
}
