use async_trait::async_trait;
use mcpanel_core::{
    AddonError, ContentItem, ContentVersion, DownloadSpec, ProviderKind, Result, SearchPage,
};
use reqwest::Client;
use serde::Deserialize;

use super::{build_client, fail_soft, fetch_json, url_with_params, ContentProvider, SearchQuery};
use crate::utils::{cap_total, page_offset};

const CURSEFORGE_API_BASE: &str = "https://api.curseforge.com/v1";
const CURSEFORGE_MINECRAFT_GAME_ID: u32 = 432;
/// sortField=2 (популярность)
const SORT_BY_POPULARITY: u32 = 2;

/// Класс проектов CurseForge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassId {
    BukkitPlugins,
    Mods,
    Worlds,
    Modpacks,
}

impl ClassId {
    pub fn id(&self) -> u32 {
        match self {
            Self::BukkitPlugins => 5,
            Self::Mods => 6,
            Self::Worlds => 17,
            Self::Modpacks => 4471,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::BukkitPlugins => "plugins",
            Self::Mods => "mods",
            Self::Worlds => "worlds",
            Self::Modpacks => "modpacks",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CfResponse<T> {
    data: T,
    #[serde(default)]
    pagination: Option<CfPagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfPagination {
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct CfMod {
    id: u64,
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    links: CfLinks,
    logo: Option<CfLogo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfLinks {
    #[serde(default)]
    website_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfLogo {
    thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfFile {
    id: u64,
    display_name: String,
}

impl From<CfMod> for ContentItem {
    fn from(m: CfMod) -> Self {
        ContentItem {
            id: m.id.to_string(),
            name: m.name,
            description: m.summary,
            url: m.links.website_url,
            icon_url: m.logo.and_then(|l| l.thumbnail_url),
        }
    }
}

/// Общая часть клиентов CurseForge (поиск и список файлов)
struct CurseForgeApi {
    client: Client,
    class_id: ClassId,
}

impl CurseForgeApi {
    fn new(class_id: ClassId, api_key: &str, extra_headers: &[(&str, &str)]) -> Result<Self> {
        let mut headers = vec![("x-api-key", api_key)];
        headers.extend_from_slice(extra_headers);
        Ok(Self {
            client: build_client(&headers)?,
            class_id,
        })
    }

    fn search_url(&self, query: &SearchQuery) -> Result<String> {
        let mut params = vec![
            ("index", page_offset(query.page, query.page_size).to_string()),
            ("pageSize", query.page_size.to_string()),
            ("gameId", CURSEFORGE_MINECRAFT_GAME_ID.to_string()),
            ("classId", self.class_id.id().to_string()),
            ("searchFilter", query.query.clone()),
            ("sortField", SORT_BY_POPULARITY.to_string()),
            ("sortOrder", "desc".to_string()),
        ];
        if let Some(version) = &query.minecraft_version {
            params.push(("gameVersion", version.clone()));
        }
        url_with_params(&format!("{}/mods/search", CURSEFORGE_API_BASE), &params)
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let url = self.search_url(query)?;
        let response: CfResponse<Vec<CfMod>> = fetch_json(&self.client, &url).await?;
        let upstream_total = response.pagination.map(|p| p.total_count).unwrap_or(0);

        Ok(SearchPage {
            items: response.data.into_iter().map(ContentItem::from).collect(),
            total: cap_total(upstream_total, query.page_size),
        })
    }

    async fn try_versions(&self, item_id: &str) -> Result<Vec<ContentVersion>> {
        let url = format!("{}/mods/{}/files", CURSEFORGE_API_BASE, item_id);
        let response: CfResponse<Vec<CfFile>> = fetch_json(&self.client, &url).await?;
        Ok(response
            .data
            .into_iter()
            .map(|f| ContentVersion {
                id: f.id.to_string(),
                name: f.display_name,
            })
            .collect())
    }

    async fn search(&self, query: &SearchQuery) -> SearchPage {
        fail_soft(ProviderKind::CurseForge, self.class_id.label(), self.try_search(query).await)
    }

    async fn versions(&self, item_id: &str) -> Vec<ContentVersion> {
        fail_soft(ProviderKind::CurseForge, "files", self.try_versions(item_id).await)
    }
}

/// Моды, плагины и модпаки: прямая ссылка из `download-url`
pub struct CurseForgeProvider {
    api: CurseForgeApi,
}

impl CurseForgeProvider {
    pub fn new(class_id: ClassId, api_key: &str) -> Result<Self> {
        Ok(Self {
            api: CurseForgeApi::new(class_id, api_key, &[])?,
        })
    }
}

#[async_trait]
impl ContentProvider for CurseForgeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CurseForge
    }

    async fn search(&self, query: &SearchQuery) -> SearchPage {
        self.api.search(query).await
    }

    async fn versions(&self, item_id: &str) -> Vec<ContentVersion> {
        self.api.versions(item_id).await
    }

    async fn get_download_url(&self, item_id: &str, version_id: &str) -> Result<DownloadSpec> {
        let url = format!(
            "{}/mods/{}/files/{}/download-url",
            CURSEFORGE_API_BASE, item_id, version_id
        );
        let response: CfResponse<Option<String>> = fetch_json(&self.api.client, &url)
            .await
            .map_err(|e| AddonError::resolution("curseforge", e.to_string()))?;

        response
            .data
            .filter(|u| !u.is_empty())
            .map(DownloadSpec::direct)
            .ok_or_else(|| {
                AddonError::resolution("curseforge", "file does not allow third-party downloads")
            })
    }
}

/// Миры: скачивание идёт через сайт, демону нужны имя файла и заголовки
pub struct CurseForgeWorldProvider {
    api: CurseForgeApi,
    api_key: String,
}

impl CurseForgeWorldProvider {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            api: CurseForgeApi::new(ClassId::Worlds, api_key, &[("Accept", "application/json")])?,
            api_key: api_key.to_string(),
        })
    }

    fn download_spec(&self, world_id: &str, file_id: &str) -> DownloadSpec {
        DownloadSpec {
            url: format!(
                "https://www.curseforge.com/api/v1/mods/{}/files/{}/download",
                world_id, file_id
            ),
            filename: Some(format!("world_{}_{}.zip", world_id, file_id)),
            use_header: true,
            foreground: false,
            headers: Default::default(),
        }
        .with_header("User-Agent", crate::USER_AGENT)
        .with_header("x-api-key", self.api_key.clone())
        .with_header("Accept", "application/json")
    }
}

#[async_trait]
impl ContentProvider for CurseForgeWorldProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CurseForge
    }

    async fn search(&self, query: &SearchQuery) -> SearchPage {
        self.api.search(query).await
    }

    async fn versions(&self, item_id: &str) -> Vec<ContentVersion> {
        self.api.versions(item_id).await
    }

    async fn get_download_url(&self, item_id: &str, version_id: &str) -> Result<DownloadSpec> {
        // Проект должен существовать, иначе демон скачает страницу ошибки
        let url = format!("{}/mods/{}", CURSEFORGE_API_BASE, item_id);
        let _: CfResponse<serde_json::Value> = fetch_json(&self.api.client, &url)
            .await
            .map_err(|e| AddonError::resolution("curseforge", e.to_string()))?;

        Ok(self.download_spec(item_id, version_id))
    }
}
