use async_trait::async_trait;
use mcpanel_core::{
    AddonError, ContentItem, ContentVersion, DownloadSpec, ProviderKind, Result, SearchPage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::cache::{ApiCache, CacheTTL};
use super::{build_client, fail_soft, fetch_json, url_with_params, ContentProvider, SearchQuery};
use crate::utils::{cap_total, page_offset};

const MODRINTH_API_BASE: &str = "https://api.modrinth.com/v2";

/// Тип проекта Modrinth, которым параметризуется клиент
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Mod,
    Plugin,
    Modpack,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mod => "mod",
            Self::Plugin => "plugin",
            Self::Modpack => "modpack",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModrinthSearchResult {
    hits: Vec<ModrinthSearchHit>,
    total_hits: u64,
}

#[derive(Debug, Deserialize)]
struct ModrinthSearchHit {
    project_id: String,
    slug: String,
    title: String,
    #[serde(default)]
    description: String,
    icon_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModrinthVersion {
    id: String,
    name: String,
    #[serde(default)]
    files: Vec<ModrinthFile>,
}

#[derive(Debug, Deserialize)]
struct ModrinthFile {
    url: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct ModrinthLoaderTag {
    name: String,
    #[serde(default)]
    supported_project_types: Vec<String>,
}

pub struct ModrinthProvider {
    client: Client,
    project_type: ProjectType,
    cache: ApiCache,
}

impl ModrinthProvider {
    pub fn new(project_type: ProjectType, cache: ApiCache) -> Result<Self> {
        Ok(Self {
            client: build_client(&[])?,
            project_type,
            cache,
        })
    }

    fn facets(&self, query: &SearchQuery) -> Vec<Vec<String>> {
        let mut facets = vec![
            vec![format!("project_type:{}", self.project_type.as_str())],
            vec!["server_side!=unsupported".to_string()],
        ];
        if let Some(version) = &query.minecraft_version {
            facets.push(vec![format!("versions:{}", version)]);
        }
        if let Some(loader) = &query.loader {
            facets.push(vec![format!("categories:{}", loader)]);
        }
        facets
    }

    fn map_hit(&self, hit: ModrinthSearchHit) -> ContentItem {
        ContentItem {
            url: format!("https://modrinth.com/{}/{}", self.project_type.as_str(), hit.slug),
            id: hit.project_id,
            name: hit.title,
            description: hit.description,
            icon_url: hit.icon_url.filter(|u| !u.is_empty()),
        }
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let facets = serde_json::to_string(&self.facets(query))?;
        let url = url_with_params(
            &format!("{}/search", MODRINTH_API_BASE),
            &[
                ("query", query.query.clone()),
                ("facets", facets),
                ("index", "relevance".to_string()),
                ("offset", page_offset(query.page, query.page_size).to_string()),
                ("limit", query.page_size.to_string()),
            ],
        )?;

        let result: ModrinthSearchResult = fetch_json(&self.client, &url).await?;
        Ok(SearchPage {
            total: cap_total(result.total_hits, query.page_size),
            items: result.hits.into_iter().map(|h| self.map_hit(h)).collect(),
        })
    }

    /// Загрузчики, поддерживающие тип проекта (кешируются на сутки)
    async fn loaders(&self) -> Vec<String> {
        let project_type = self.project_type.as_str();
        let key = format!("modrinth:loaders:{}", project_type);
        let client = &self.client;

        let result = self
            .cache
            .get_or_fetch(&key, CacheTTL::Static, || async move {
                let tags: Vec<ModrinthLoaderTag> =
                    fetch_json(client, &format!("{}/tag/loader", MODRINTH_API_BASE)).await?;
                Ok(loaders_for(&tags, project_type))
            })
            .await;

        fail_soft(ProviderKind::Modrinth, "loaders", result)
    }

    async fn try_versions(&self, item_id: &str) -> Result<Vec<ContentVersion>> {
        let base = format!("{}/project/{}/version", MODRINTH_API_BASE, item_id);
        // Модпаки ставятся профилем установщика, фильтр по загрузчику не нужен
        let url = if self.project_type == ProjectType::Modpack {
            base
        } else {
            let loaders = serde_json::to_string(&self.loaders().await)?;
            url_with_params(&base, &[("loaders", loaders)])?
        };

        let versions: Vec<ModrinthVersion> = fetch_json(&self.client, &url).await?;
        Ok(versions
            .into_iter()
            .map(|v| ContentVersion { id: v.id, name: v.name })
            .collect())
    }
}

fn loaders_for(tags: &[ModrinthLoaderTag], project_type: &str) -> Vec<String> {
    tags.iter()
        .filter(|t| t.supported_project_types.iter().any(|p| p == project_type))
        .map(|t| t.name.clone())
        .collect()
}

#[async_trait]
impl ContentProvider for ModrinthProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Modrinth
    }

    async fn search(&self, query: &SearchQuery) -> SearchPage {
        fail_soft(
            ProviderKind::Modrinth,
            self.project_type.as_str(),
            self.try_search(query).await,
        )
    }

    async fn versions(&self, item_id: &str) -> Vec<ContentVersion> {
        fail_soft(
            ProviderKind::Modrinth,
            "versions",
            self.try_versions(item_id).await,
        )
    }

    async fn get_download_url(&self, _item_id: &str, version_id: &str) -> Result<DownloadSpec> {
        let url = format!("{}/version/{}", MODRINTH_API_BASE, version_id);
        let version: ModrinthVersion = fetch_json(&self.client, &url)
            .await
            .map_err(|e| AddonError::resolution("modrinth", e.to_string()))?;

        version
            .files
            .into_iter()
            .next()
            .map(|f| DownloadSpec::direct(f.url))
            .ok_or_else(|| AddonError::resolution("modrinth", "version has no files"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(project_type: ProjectType) -> ModrinthProvider {
        ModrinthProvider::new(project_type, ApiCache::default()).unwrap()
    }

    #[test]
    fn test_facets_with_filters() {
        let p = provider(ProjectType::Plugin);
        let q = SearchQuery::new("luckperms", 20, 1)
            .with_minecraft_version(Some("1.21.1".into()))
            .with_loader(Some("paper".into()));
        let json = serde_json::to_string(&p.facets(&q)).unwrap();
        assert_eq!(
            json,
            r#"[["project_type:plugin"],["server_side!=unsupported"],["versions:1.21.1"],["categories:paper"]]"#
        );
    }

    #[test]
    fn test_map_hit_url_and_empty_icon() {
        let p = provider(ProjectType::Mod);
        let item = p.map_hit(ModrinthSearchHit {
            project_id: "AANobbMI".into(),
            slug: "sodium".into(),
            title: "Sodium".into(),
            description: "Rendering engine".into(),
            icon_url: Some(String::new()),
        });
        assert_eq!(item.id, "AANobbMI");
        assert_eq!(item.url, "https://modrinth.com/mod/sodium");
        assert_eq!(item.icon_url, None);
    }

    #[test]
    fn test_loaders_for_project_type() {
        let tags: Vec<ModrinthLoaderTag> = serde_json::from_str(
            r#"[
                {"icon": "", "name": "fabric", "supported_project_types": ["mod", "modpack"]},
                {"icon": "", "name": "paper", "supported_project_types": ["plugin"]},
                {"icon": "", "name": "minecraft", "supported_project_types": ["resourcepack"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(loaders_for(&tags, "mod"), vec!["fabric"]);
        assert_eq!(loaders_for(&tags, "plugin"), vec!["paper"]);
    }

    #[test]
    fn test_search_result_parsing() {
        let result: ModrinthSearchResult = serde_json::from_str(
            r#"{"hits": [{"project_id": "P7dR8mSH", "slug": "fabric-api", "title": "Fabric API",
                "description": "Core API", "icon_url": "https://cdn.modrinth.com/icon.png"}],
                "offset": 0, "limit": 20, "total_hits": 123456}"#,
        )
        .unwrap();
        assert_eq!(result.hits.len(), 1);
        assert_eq!(cap_total(result.total_hits, 20), 10_000);
    }
}
