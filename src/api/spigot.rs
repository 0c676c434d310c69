use async_trait::async_trait;
use mcpanel_core::{AddonError, ContentItem, ContentVersion, DownloadSpec, ProviderKind, Result, SearchPage};
use reqwest::Client;
use serde::Deserialize;

use super::{build_client, fail_soft, fetch_json, url_with_params, ContentProvider, SearchQuery};
use crate::utils::{cap_total, excerpt};

const SPIGET_API_BASE: &str = "https://api.spiget.org/v2";

#[derive(Debug, Deserialize)]
struct SpigetResource {
    id: u64,
    name: String,
    #[serde(default)]
    tag: String,
    icon: Option<SpigetIcon>,
}

#[derive(Debug, Deserialize)]
struct SpigetIcon {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct SpigetVersion {
    id: u64,
    name: String,
}

impl From<SpigetResource> for ContentItem {
    fn from(r: SpigetResource) -> Self {
        ContentItem {
            id: r.id.to_string(),
            url: format!("https://www.spigotmc.org/resources/{}", r.id),
            name: r.name,
            description: r.tag,
            icon_url: r
                .icon
                .filter(|i| !i.url.is_empty())
                .map(|i| format!("https://www.spigotmc.org/{}", i.url)),
        }
    }
}

/// SpigotMC через Spiget
pub struct SpigotProvider {
    client: Client,
}

impl SpigotProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(&[])?,
        })
    }

    fn search_url(query: &SearchQuery) -> Result<String> {
        let base = if query.query.is_empty() {
            format!("{}/resources/free", SPIGET_API_BASE)
        } else {
            format!(
                "{}/search/resources/{}",
                SPIGET_API_BASE,
                urlencoding::encode(&query.query)
            )
        };
        url_with_params(
            &base,
            &[
                ("size", query.page_size.to_string()),
                ("page", query.page.to_string()),
                ("sort", "-likes".to_string()),
            ],
        )
    }

    // Общее число приходит в заголовке, поэтому без fetch_json
    async fn try_search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let url = Self::search_url(query)?;
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let total = response
            .headers()
            .get("X-Total-Count")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let text = response.text().await?;

        if !status.is_success() {
            return Err(AddonError::Api(format!(
                "Spiget returned HTTP {}: {}",
                status,
                excerpt(&text)
            )));
        }

        let resources: Vec<SpigetResource> = serde_json::from_str(&text)?;
        Ok(SearchPage {
            items: resources.into_iter().map(ContentItem::from).collect(),
            total: cap_total(total, query.page_size),
        })
    }

    async fn try_versions(&self, item_id: &str) -> Result<Vec<ContentVersion>> {
        let url = url_with_params(
            &format!("{}/resources/{}/versions", SPIGET_API_BASE, item_id),
            &[("size", "100".to_string()), ("sort", "-releaseDate".to_string())],
        )?;
        let versions: Vec<SpigetVersion> = fetch_json(&self.client, &url).await?;
        Ok(versions
            .into_iter()
            .map(|v| ContentVersion {
                id: v.id.to_string(),
                name: v.name,
            })
            .collect())
    }
}

#[async_trait]
impl ContentProvider for SpigotProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SpigotMc
    }

    async fn search(&self, query: &SearchQuery) -> SearchPage {
        fail_soft(ProviderKind::SpigotMc, "plugins", self.try_search(query).await)
    }

    async fn versions(&self, item_id: &str) -> Vec<ContentVersion> {
        fail_soft(ProviderKind::SpigotMc, "versions", self.try_versions(item_id).await)
    }

    async fn get_download_url(&self, item_id: &str, version_id: &str) -> Result<DownloadSpec> {
        Ok(DownloadSpec::direct(format!(
            "{}/resources/{}/versions/{}/download",
            SPIGET_API_BASE, item_id, version_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_switches_endpoint() {
        let free = SpigotProvider::search_url(&SearchQuery::new("", 20, 1)).unwrap();
        assert!(free.starts_with("https://api.spiget.org/v2/resources/free?"));

        let search = SpigotProvider::search_url(&SearchQuery::new("world edit", 20, 2)).unwrap();
        assert!(search.starts_with("https://api.spiget.org/v2/search/resources/world%20edit?"));
        assert!(search.contains("page=2"));
        assert!(search.contains("sort=-likes"));
    }

    #[test]
    fn test_resource_icon_mapping() {
        let resources: Vec<SpigetResource> = serde_json::from_str(
            r#"[
                {"id": 28140, "name": "LuckPerms", "tag": "Permissions", "icon": {"url": "data/resource_icons/28/28140.jpg", "data": ""}},
                {"id": 1, "name": "NoIcon", "tag": "", "icon": {"url": "", "data": ""}}
            ]"#,
        )
        .unwrap();
        let items: Vec<ContentItem> = resources.into_iter().map(ContentItem::from).collect();
        assert_eq!(
            items[0].icon_url.as_deref(),
            Some("https://www.spigotmc.org/data/resource_icons/28/28140.jpg")
        );
        assert_eq!(items[0].url, "https://www.spigotmc.org/resources/28140");
        assert_eq!(items[1].icon_url, None);
    }

    #[tokio::test]
    async fn test_download_url_is_local() {
        let provider = SpigotProvider::new().unwrap();
        let spec = provider.get_download_url("28140", "512345").await.unwrap();
        assert_eq!(
            spec.url,
            "https://api.spiget.org/v2/resources/28140/versions/512345/download"
        );
    }
}
