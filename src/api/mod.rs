//! Клиенты площадок контента.
//!
//! Каждая площадка реализует [`ContentProvider`]: `search` и `versions`
//! никогда не возвращают ошибку (пустой результат + запись в лог), а
//! `get_download_url` возвращает `DownloadResolution`, чтобы установка
//! прервалась до изменения файлов сервера.

pub mod cache;
pub mod curseforge;
pub mod ftb;
pub mod hangar;
pub mod mcjars;
pub mod modrinth;
pub mod spigot;
pub mod vanillatweaks;

use async_trait::async_trait;
use mcpanel_core::{
    AddonError, ContentKind, ContentVersion, DownloadSpec, ProviderKind, Result, SearchPage,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AddonConfig;
use crate::utils::excerpt;

/// Параметры поиска, общие для всех площадок
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub page_size: u32,
    /// Номер страницы, начиная с 1
    pub page: u32,
    pub minecraft_version: Option<String>,
    pub loader: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, page_size: u32, page: u32) -> Self {
        Self {
            query: query.into(),
            page_size,
            page,
            minecraft_version: None,
            loader: None,
        }
    }

    pub fn with_minecraft_version(mut self, version: Option<String>) -> Self {
        self.minecraft_version = version.filter(|v| !v.is_empty());
        self
    }

    pub fn with_loader(mut self, loader: Option<String>) -> Self {
        self.loader = loader.filter(|l| !l.is_empty());
        self
    }
}

#[async_trait]
pub trait ContentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Поиск. Сетевые ошибки и ошибки разбора дают пустую страницу.
    async fn search(&self, query: &SearchQuery) -> SearchPage;

    /// Версии проекта. При ошибке возвращает пустой список.
    async fn versions(&self, item_id: &str) -> Vec<ContentVersion>;

    /// Ссылка на скачивание конкретной версии
    async fn get_download_url(&self, item_id: &str, version_id: &str) -> Result<DownloadSpec>;
}

/// Реестр площадок по разделу каталога и селектору из запроса
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<(ContentKind, ProviderKind), Arc<dyn ContentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, domain: ContentKind, provider: Arc<dyn ContentProvider>) {
        self.providers.insert((domain, provider.kind()), provider);
    }

    /// Находит площадку по строковому селектору (`provider` из запроса)
    pub fn get(&self, domain: ContentKind, selector: &str) -> Result<Arc<dyn ContentProvider>> {
        let kind = ProviderKind::parse(selector).ok_or_else(|| {
            AddonError::Validation(format!("The selected provider is invalid: {}", selector))
        })?;
        self.resolve(domain, kind)
    }

    pub fn resolve(&self, domain: ContentKind, kind: ProviderKind) -> Result<Arc<dyn ContentProvider>> {
        self.providers.get(&(domain, kind)).cloned().ok_or_else(|| {
            AddonError::Validation(format!(
                "The selected provider is invalid: {} does not serve {}s",
                kind,
                domain.as_str()
            ))
        })
    }

    /// Селекторы, доступные в разделе, в порядке регистрации не гарантируются
    pub fn kinds(&self, domain: ContentKind) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self
            .providers
            .keys()
            .filter(|(d, _)| *d == domain)
            .map(|(_, k)| *k)
            .collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    /// Стандартный набор площадок для Minecraft
    pub fn minecraft(config: &AddonConfig) -> Result<Self> {
        let shared = cache::ApiCache::default();
        let cf_key = config.curseforge_api_key.clone();
        let mut registry = Self::new();

        registry.register(
            ContentKind::Mod,
            Arc::new(modrinth::ModrinthProvider::new(modrinth::ProjectType::Mod, shared.clone())?),
        );
        registry.register(
            ContentKind::Mod,
            Arc::new(curseforge::CurseForgeProvider::new(curseforge::ClassId::Mods, &cf_key)?),
        );

        registry.register(
            ContentKind::Plugin,
            Arc::new(modrinth::ModrinthProvider::new(modrinth::ProjectType::Plugin, shared.clone())?),
        );
        registry.register(
            ContentKind::Plugin,
            Arc::new(curseforge::CurseForgeProvider::new(curseforge::ClassId::BukkitPlugins, &cf_key)?),
        );
        registry.register(ContentKind::Plugin, Arc::new(spigot::SpigotProvider::new()?));
        registry.register(ContentKind::Plugin, Arc::new(hangar::HangarProvider::new()?));

        registry.register(
            ContentKind::Modpack,
            Arc::new(curseforge::CurseForgeProvider::new(curseforge::ClassId::Modpacks, &cf_key)?),
        );
        registry.register(ContentKind::Modpack, Arc::new(ftb::FeedTheBeastProvider::new()?));
        registry.register(
            ContentKind::Modpack,
            Arc::new(modrinth::ModrinthProvider::new(modrinth::ProjectType::Modpack, shared)?),
        );

        registry.register(
            ContentKind::World,
            Arc::new(curseforge::CurseForgeWorldProvider::new(&cf_key)?),
        );

        Ok(registry)
    }
}

// ============================================================================
// Shared HTTP helpers
// ============================================================================

/// HTTP-клиент с общим User-Agent и дополнительными заголовками
pub(crate) fn build_client(headers: &[(&str, &str)]) -> Result<Client> {
    let mut map = reqwest::header::HeaderMap::new();
    for (name, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AddonError::InvalidConfig(format!("Invalid header name {}: {}", name, e)))?;
        let value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| AddonError::InvalidConfig(format!("Invalid header value for {}: {}", name, e)))?;
        map.insert(name, value);
    }

    Client::builder()
        .user_agent(crate::USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .default_headers(map)
        .build()
        .map_err(|e| AddonError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))
}

/// GET + разбор JSON с понятными ошибками (URL и начало тела ответа в логе)
pub(crate) async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let response = client.get(url).send().await.map_err(|e| {
        log::error!("API request failed for {}: {}", url, e);
        AddonError::Api(format!("Request failed: {}", e))
    })?;

    let status = response.status();
    let text = response.text().await.map_err(|e| {
        log::error!("Failed to read response body from {}: {}", url, e);
        AddonError::Api(format!("Failed to read response: {}", e))
    })?;

    if !status.is_success() {
        log::error!("API HTTP {}: {} (URL: {})", status, excerpt(&text), url);
        return Err(AddonError::Api(format!(
            "API returned HTTP {}: {}",
            status,
            excerpt(&text)
        )));
    }

    serde_json::from_str(&text).map_err(|e| {
        log::error!("Failed to parse JSON from {}: {}", url, e);
        log::debug!("Response body (first 200 chars): {}", excerpt(&text));
        AddonError::Api(format!("Invalid JSON: {} (URL: {})", e, url))
    })
}

/// Строит URL с корректно закодированными параметрами
pub(crate) fn url_with_params(base: &str, params: &[(&str, String)]) -> Result<String> {
    reqwest::Url::parse_with_params(base, params.iter().map(|(k, v)| (*k, v.as_str())))
        .map(|u| u.to_string())
        .map_err(|e| AddonError::Api(format!("Failed to build URL: {}", e)))
}

/// Превращает ошибку поиска в пустой результат, сохраняя запись в логе
pub(crate) fn fail_soft<T: Default>(provider: ProviderKind, what: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::error!("Received bad response when fetching {} from {}: {}", what, provider, e);
            T::default()
        }
    }
}
