use async_trait::async_trait;
use mcpanel_core::{
    AddonError, ContentItem, ContentVersion, DownloadSpec, ProviderKind, Result, SearchPage,
};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{build_client, fail_soft, fetch_json, url_with_params, ContentProvider, SearchQuery};
use crate::utils::{cap_total, page_offset};

const HANGAR_API_BASE: &str = "https://hangar.papermc.io/api/v1";
/// Hangar не отдаёт больше 25 проектов за запрос
pub const MAX_PAGE_SIZE: u32 = 25;
const PREFERRED_PLATFORM: &str = "PAPER";

#[derive(Debug, Deserialize)]
struct HangarPage<T> {
    result: Vec<T>,
    #[serde(default)]
    pagination: HangarPagination,
}

#[derive(Debug, Default, Deserialize)]
struct HangarPagination {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HangarProject {
    name: String,
    #[serde(default)]
    description: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HangarVersion {
    name: String,
    #[serde(default)]
    downloads: BTreeMap<String, HangarDownload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HangarDownload {
    download_url: Option<String>,
    external_url: Option<String>,
}

pub struct HangarProvider {
    client: Client,
}

impl HangarProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(&[("Accept", "application/json")])?,
        })
    }

    fn search_url(query: &SearchQuery) -> Result<String> {
        let page_size = query.page_size.min(MAX_PAGE_SIZE);
        let mut params = vec![
            ("limit", page_size.to_string()),
            ("offset", page_offset(query.page, page_size).to_string()),
            ("sort", "-stars".to_string()),
        ];
        if !query.query.is_empty() {
            params.push(("query", query.query.clone()));
        }
        if let Some(version) = &query.minecraft_version {
            params.push(("version", version.clone()));
            params.push(("platform", PREFERRED_PLATFORM.to_string()));
        }
        url_with_params(&format!("{}/projects", HANGAR_API_BASE), &params)
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let url = Self::search_url(query)?;
        let page: HangarPage<HangarProject> = fetch_json(&self.client, &url).await?;

        Ok(SearchPage {
            total: cap_total(page.pagination.count, query.page_size.min(MAX_PAGE_SIZE)),
            items: page
                .result
                .into_iter()
                .map(|p| ContentItem {
                    url: format!("https://hangar.papermc.io/projects/{}", p.name),
                    id: p.name.clone(),
                    name: p.name,
                    description: p.description,
                    icon_url: p.avatar_url,
                })
                .collect(),
        })
    }

    async fn try_versions(&self, item_id: &str) -> Result<Vec<ContentVersion>> {
        let url = url_with_params(
            &format!("{}/projects/{}/versions", HANGAR_API_BASE, item_id),
            &[("limit", "100".to_string())],
        )?;
        let page: HangarPage<HangarVersion> = fetch_json(&self.client, &url).await?;
        Ok(page
            .result
            .into_iter()
            .map(|v| ContentVersion {
                id: v.name.clone(),
                name: v.name,
            })
            .collect())
    }
}

/// PAPER, иначе первая платформа; downloadUrl, иначе externalUrl,
/// иначе эндпоинт загрузки Hangar
fn pick_download(plugin_id: &str, version: &HangarVersion) -> String {
    let download = version
        .downloads
        .get(PREFERRED_PLATFORM)
        .or_else(|| version.downloads.values().next());

    download
        .and_then(|d| d.download_url.clone().or_else(|| d.external_url.clone()))
        .unwrap_or_else(|| {
            format!(
                "{}/projects/{}/versions/{}/download",
                HANGAR_API_BASE, plugin_id, version.name
            )
        })
}

#[async_trait]
impl ContentProvider for HangarProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Hangar
    }

    async fn search(&self, query: &SearchQuery) -> SearchPage {
        fail_soft(ProviderKind::Hangar, "plugins", self.try_search(query).await)
    }

    async fn versions(&self, item_id: &str) -> Vec<ContentVersion> {
        fail_soft(ProviderKind::Hangar, "versions", self.try_versions(item_id).await)
    }

    async fn get_download_url(&self, item_id: &str, version_id: &str) -> Result<DownloadSpec> {
        let url = format!("{}/projects/{}/versions/{}", HANGAR_API_BASE, item_id, version_id);
        let version: HangarVersion = fetch_json(&self.client, &url)
            .await
            .map_err(|e| AddonError::resolution("hangar", e.to_string()))?;
        Ok(DownloadSpec::direct(pick_download(item_id, &version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(json: &str) -> HangarVersion {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_search_url_clamps_page_size() {
        let url = HangarProvider::search_url(&SearchQuery::new("", 50, 2)).unwrap();
        assert!(url.contains("limit=25"));
        assert!(url.contains("offset=25"));
        assert!(!url.contains("query="));

        let url = HangarProvider::search_url(
            &SearchQuery::new("essentials", 10, 1).with_minecraft_version(Some("1.21".into())),
        )
        .unwrap();
        assert!(url.contains("query=essentials"));
        assert!(url.contains("platform=PAPER"));
    }

    #[test]
    fn test_pick_download_prefers_paper() {
        let v = version(
            r#"{"name": "2.20.1", "downloads": {
                "VELOCITY": {"downloadUrl": "https://hangar/velocity.jar", "externalUrl": null},
                "PAPER": {"downloadUrl": "https://hangar/paper.jar", "externalUrl": null}}}"#,
        );
        assert_eq!(pick_download("EssentialsX", &v), "https://hangar/paper.jar");
    }

    #[test]
    fn test_pick_download_falls_back_to_external() {
        let v = version(
            r#"{"name": "5.4", "downloads": {
                "VELOCITY": {"downloadUrl": null, "externalUrl": "https://github.com/x/releases"}}}"#,
        );
        assert_eq!(pick_download("LuckPerms", &v), "https://github.com/x/releases");

        let empty = version(r#"{"name": "1.0", "downloads": {}}"#);
        assert_eq!(
            pick_download("Foo", &empty),
            "https://hangar.papermc.io/api/v1/projects/Foo/versions/1.0/download"
        );
    }
}
