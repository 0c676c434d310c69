use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mcpanel_core::{
    AddonError, ContentItem, ContentVersion, DownloadSpec, ProviderKind, Result, SearchPage,
};
use reqwest::Client;
use serde::Deserialize;

use super::{build_client, fail_soft, fetch_json, url_with_params, ContentProvider, SearchQuery};
use crate::utils::{cap_total, page_offset};

const FTB_API_BASE: &str = "https://api.feed-the-beast.com/v1/modpacks/public/modpack";
/// Служебный пак, который FTB отдаёт в выдаче, но не даёт открыть
const HIDDEN_PACK_ID: u64 = 81;
const DETAILS_CONCURRENCY: usize = 5;

#[derive(Debug, Deserialize)]
struct FtbPackList {
    packs: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct FtbPack {
    #[serde(default)]
    status: String,
    id: u64,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    art: Vec<FtbArt>,
    #[serde(default)]
    versions: Vec<FtbVersion>,
}

#[derive(Debug, Deserialize)]
struct FtbArt {
    #[serde(rename = "type")]
    art_type: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct FtbVersion {
    id: u64,
    name: String,
}

impl From<FtbPack> for ContentItem {
    fn from(p: FtbPack) -> Self {
        ContentItem {
            id: p.id.to_string(),
            url: format!("https://feed-the-beast.com/modpacks/{}", p.id),
            icon_url: p
                .art
                .into_iter()
                .find(|a| a.art_type == "square")
                .map(|a| a.url),
            name: p.name,
            description: p.description,
        }
    }
}

/// Feed The Beast. Пагинация локальная: API отдаёт только список id.
pub struct FeedTheBeastProvider {
    client: Client,
}

impl FeedTheBeastProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(&[])?,
        })
    }

    fn list_url(query: &SearchQuery) -> Result<String> {
        if query.query.is_empty() {
            Ok(format!("{}/popular/installs/10000", FTB_API_BASE))
        } else {
            url_with_params(
                &format!("{}/search/10000", FTB_API_BASE),
                &[("term", query.query.clone())],
            )
        }
    }

    async fn pack(&self, id: u64) -> Option<FtbPack> {
        let url = format!("{}/{}", FTB_API_BASE, id);
        match fetch_json::<FtbPack>(&self.client, &url).await {
            Ok(pack) if pack.status != "error" => Some(pack),
            Ok(_) => {
                log::error!("Received error status for FTB modpack {}", id);
                None
            }
            Err(e) => {
                log::error!("Received bad response when fetching FTB modpack {}: {}", id, e);
                None
            }
        }
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let list: FtbPackList = fetch_json(&self.client, &Self::list_url(query)?).await?;
        let Some(all) = list.packs else {
            return Ok(SearchPage::empty());
        };

        let total = all.len() as u64;
        let ids = page_ids(&all, query.page, query.page_size);

        // buffered сохраняет порядок страницы
        let items: Vec<ContentItem> = stream::iter(ids)
            .map(|id| self.pack(id))
            .buffered(DETAILS_CONCURRENCY)
            .filter_map(|pack| async move { pack.map(ContentItem::from) })
            .collect()
            .await;

        Ok(SearchPage {
            items,
            total: cap_total(total, query.page_size),
        })
    }

    async fn try_versions(&self, item_id: &str) -> Result<Vec<ContentVersion>> {
        let pack: FtbPack = fetch_json(&self.client, &format!("{}/{}", FTB_API_BASE, item_id)).await?;
        Ok(pack
            .versions
            .into_iter()
            .rev()
            .map(|v| ContentVersion {
                id: v.id.to_string(),
                name: v.name,
            })
            .collect())
    }
}

fn page_ids(all: &[u64], page: u32, page_size: u32) -> Vec<u64> {
    all.iter()
        .skip(page_offset(page, page_size) as usize)
        .take(page_size as usize)
        .copied()
        .filter(|id| *id != HIDDEN_PACK_ID)
        .collect()
}

#[async_trait]
impl ContentProvider for FeedTheBeastProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::FeedTheBeast
    }

    async fn search(&self, query: &SearchQuery) -> SearchPage {
        fail_soft(ProviderKind::FeedTheBeast, "modpacks", self.try_search(query).await)
    }

    async fn versions(&self, item_id: &str) -> Vec<ContentVersion> {
        fail_soft(ProviderKind::FeedTheBeast, "versions", self.try_versions(item_id).await)
    }

    /// FTB модпаки скачивает профиль установщика, прямой ссылки нет
    async fn get_download_url(&self, _item_id: &str, _version_id: &str) -> Result<DownloadSpec> {
        Err(AddonError::resolution(
            "feedthebeast",
            "direct downloads are not supported, the installer profile fetches the pack",
        ))
    }
}
