//! Каталог серверных ядер (mcjars): форки, версии и сборки.

use mcpanel_core::{AddonError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{build_client, fetch_json};

const MCJARS_API_BASE: &str = "https://mcjars.app/api/v2";
const FORK_CATEGORIES: [&str; 5] = [
    "recommended",
    "established",
    "experimental",
    "miscellaneous",
    "limbos",
];

#[derive(Debug, Deserialize)]
struct TypesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    types: BTreeMap<String, BTreeMap<String, RawFork>>,
}

#[derive(Debug, Deserialize)]
struct RawFork {
    name: Option<String>,
    icon: Option<String>,
    description: Option<String>,
    builds: Option<u64>,
    #[serde(default)]
    versions: RawForkVersions,
}

#[derive(Debug, Default, Deserialize)]
struct RawForkVersions {
    minecraft: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    builds: BTreeMap<String, RawVersion>,
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    #[serde(rename = "type")]
    version_type: Option<String>,
    supported: Option<bool>,
    builds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BuildsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    builds: Vec<McjarsBuild>,
}

/// Сборка ядра в том виде, в котором её отдаёт mcjars
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McjarsBuild {
    #[serde(default)]
    pub build_number: Option<serde_json::Value>,
    pub name: Option<String>,
    pub zip_url: Option<String>,
    pub jar_url: Option<String>,
    #[serde(default)]
    pub experimental: bool,
    pub created: Option<String>,
    #[serde(default)]
    pub changes: Vec<serde_json::Value>,
}

impl McjarsBuild {
    /// buildNumber приходит числом, но сравнивается как строка
    pub fn build_number_str(&self) -> Option<String> {
        match self.build_number.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkVersionsCount {
    pub minecraft: Option<u64>,
}

/// Форк для витрины
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fork {
    pub name: String,
    pub icon: Option<String>,
    pub description: String,
    pub builds: Option<u64>,
    pub versions: ForkVersionsCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkVersion {
    #[serde(rename = "type")]
    pub version_type: String,
    pub supported: bool,
    pub builds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildChannel {
    Experimental,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub build_number: String,
    pub name: String,
    pub time: String,
    pub channel: BuildChannel,
    pub changes: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct McjarsClient {
    client: Client,
    base_url: String,
}

impl McjarsClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(&[])?,
            base_url: MCJARS_API_BASE.to_string(),
        })
    }

    /// Все форки из всех категорий
    pub async fn forks(&self) -> Result<BTreeMap<String, Fork>> {
        let response: TypesResponse =
            fetch_json(&self.client, &format!("{}/types", self.base_url)).await?;
        Ok(merge_forks(response))
    }

    /// Версии Minecraft, доступные для форка
    pub async fn versions(&self, fork: &str) -> Result<BTreeMap<String, ForkVersion>> {
        let url = format!("{}/builds/{}", self.base_url, fork);
        let response: VersionsResponse = fetch_json(&self.client, &url).await?;
        if !response.success {
            return Ok(BTreeMap::new());
        }
        Ok(response
            .builds
            .into_iter()
            .map(|(id, v)| {
                (
                    id,
                    ForkVersion {
                        version_type: v.version_type.unwrap_or_else(|| "UNKNOWN".to_string()),
                        supported: v.supported.unwrap_or(true),
                        builds: v.builds.unwrap_or(0),
                    },
                )
            })
            .collect())
    }

    /// Сборки в порядке mcjars (первая считается последней сборкой)
    pub async fn raw_builds(&self, fork: &str, version: &str) -> Result<Vec<McjarsBuild>> {
        let url = format!("{}/builds/{}/{}", self.base_url, fork, version);
        let response: BuildsResponse = fetch_json(&self.client, &url).await?;
        if !response.success {
            return Err(AddonError::Api(format!("mcjars returned no builds for {} {}", fork, version)));
        }
        Ok(response.builds)
    }

    /// Файл ядра целиком, в обход демона
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AddonError::Api(format!("Empty server file from {}", url)));
        }
        Ok(bytes.to_vec())
    }

    /// Сборки для витрины, по убыванию номера
    pub async fn builds(&self, fork: &str, version: &str) -> Result<Vec<BuildSummary>> {
        Ok(summarize_builds(self.raw_builds(fork, version).await?))
    }
}

fn merge_forks(response: TypesResponse) -> BTreeMap<String, Fork> {
    let mut forks = BTreeMap::new();
    if !response.success {
        return forks;
    }
    let mut types = response.types;
    for category in FORK_CATEGORIES {
        let Some(entries) = types.remove(category) else {
            continue;
        };
        for (id, fork) in entries {
            if let (Some(name), Some(description)) = (fork.name, fork.description) {
                forks.insert(
                    id,
                    Fork {
                        name,
                        icon: fork.icon,
                        description,
                        builds: fork.builds,
                        versions: ForkVersionsCount {
                            minecraft: fork.versions.minecraft,
                        },
                    },
                );
            }
        }
    }
    forks
}

fn summarize_builds(raw: Vec<McjarsBuild>) -> Vec<BuildSummary> {
    let mut builds: Vec<BuildSummary> = raw
        .into_iter()
        .filter_map(|b| {
            let number = b.build_number_str()?;
            Some(BuildSummary {
                name: b.name.clone().unwrap_or_else(|| format!("Build {}", number)),
                build_number: number,
                time: b
                    .created
                    .clone()
                    .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
                channel: if b.experimental {
                    BuildChannel::Experimental
                } else {
                    BuildChannel::Stable
                },
                changes: b.changes,
            })
        })
        .collect();

    builds.sort_by(|a, b| match (a.build_number.parse::<u64>(), b.build_number.parse::<u64>()) {
        (Ok(x), Ok(y)) => y.cmp(&x),
        _ => b.build_number.cmp(&a.build_number),
    });
    builds
}
