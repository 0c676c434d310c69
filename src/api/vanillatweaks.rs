//! VanillaTweaks: датапаки, ресурспаки и crafting tweaks.
//!
//! У сервиса нет публичного API, поэтому клиент ходит туда же, куда и
//! страница-конструктор: json-каталоги, генерация zip и иконки.

use mcpanel_core::{AddonError, PackType, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::LazyLock;

use super::build_client;
use super::cache::{ApiCache, CacheTTL};
use crate::utils::{compare_versions, excerpt};

const VANILLATWEAKS_BASE: &str = "https://vanillatweaks.net";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:143.0) Gecko/20100101 Firefox/143.0";
const FALLBACK_VERSIONS: [&str; 6] = ["1.21", "1.20", "1.19", "1.18", "1.17", "1.16"];

#[derive(Debug, Deserialize)]
struct ZipResponse {
    status: Option<String>,
    link: Option<String>,
}

#[derive(Clone)]
pub struct VanillaTweaksClient {
    client: Client,
    cache: ApiCache,
}

impl VanillaTweaksClient {
    pub fn new(cache: ApiCache) -> Result<Self> {
        Ok(Self {
            client: build_client(&[
                ("User-Agent", BROWSER_USER_AGENT),
                ("Accept", "*/*"),
                ("Accept-Language", "en-US,en;q=0.9"),
            ])?,
            cache,
        })
    }

    fn referer(pack_type: PackType) -> String {
        format!("{}/picker/{}/", VANILLATWEAKS_BASE, pack_type.as_str())
    }

    /// Версии Minecraft, для которых есть паки (кеш на час)
    pub async fn versions(&self) -> Vec<String> {
        let client = &self.client;
        let result = self
            .cache
            .get_or_fetch("vanillatweaks:versions", CacheTTL::Long, || async move {
                let html = client
                    .get(format!("{}/picker/datapacks/", VANILLATWEAKS_BASE))
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                Ok(extract_versions(&html))
            })
            .await;

        match result {
            Ok(versions) if !versions.is_empty() => versions,
            Ok(_) => fallback_versions(),
            Err(e) => {
                log::warn!("Failed to scrape VanillaTweaks versions, using fallback: {}", e);
                fallback_versions()
            }
        }
    }

    /// Каталог паков по категориям. При ошибке пустой объект.
    pub async fn packs(&self, version: &str, pack_type: PackType) -> serde_json::Value {
        let url = format!(
            "{}/assets/resources/json/{}/{}categories.json",
            VANILLATWEAKS_BASE,
            version,
            pack_type.catalog_prefix()
        );

        let result: Result<serde_json::Value> = async {
            let text = self
                .client
                .get(&url)
                .header("Referer", Self::referer(pack_type))
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            Ok(serde_json::from_str(&text)?)
        }
        .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to fetch VanillaTweaks packs from {}: {}", url, e);
                serde_json::Value::Object(Default::default())
            }
        }
    }

    /// Просит VanillaTweaks собрать архив и возвращает ссылку на него
    pub async fn generate_link(
        &self,
        version: &str,
        pack_type: PackType,
        packs: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String> {
        let body = form_body(version, packs)?;
        let url = format!("{}/assets/server/zip{}.php", VANILLATWEAKS_BASE, pack_type.as_str());

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", Self::referer(pack_type))
            .body(body)
            .send()
            .await
            .map_err(|e| AddonError::resolution("vanillatweaks", e.to_string()))?;

        let text = response
            .text()
            .await
            .map_err(|e| AddonError::resolution("vanillatweaks", e.to_string()))?;
        let parsed: ZipResponse = serde_json::from_str(&text).map_err(|e| {
            log::error!("Unexpected VanillaTweaks zip response: {}", excerpt(&text));
            AddonError::resolution("vanillatweaks", e.to_string())
        })?;

        match (parsed.status.as_deref(), parsed.link) {
            (Some("success"), Some(link)) => Ok(format!("{}{}", VANILLATWEAKS_BASE, link)),
            _ => Err(AddonError::resolution(
                "vanillatweaks",
                "Failed to generate download link from VanillaTweaks.",
            )),
        }
    }

    /// Скачивает собранный архив целиком
    pub async fn download_zip(&self, link: &str, pack_type: PackType) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(link)
            .header("Referer", Self::referer(pack_type))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    /// Иконка пака (PNG). 404 и сетевые ошибки дают NotFound.
    pub async fn image(&self, version: &str, pack_type: PackType, pack: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/assets/resources/icons/{}/{}/{}.png",
            VANILLATWEAKS_BASE,
            pack_type.as_str(),
            version,
            urlencoding::encode(pack)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| AddonError::NotFound("Image not found".into()))?;
        if !response.status().is_success() {
            return Err(AddonError::NotFound("Image not found".into()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|_| AddonError::NotFound("Image not found".into()))?;
        Ok(bytes.to_vec())
    }
}

fn fallback_versions() -> Vec<String> {
    FALLBACK_VERSIONS.iter().map(|v| v.to_string()).collect()
}

/// Версии 1.13..2.0 со страницы, без повторов, новые первыми
fn extract_versions(html: &str) -> Vec<String> {
    static VERSION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"1\.\d+").expect("valid picker version regex"));
    let mut versions: Vec<String> = Vec::new();
    for m in VERSION_RE.find_iter(html) {
        let v = m.as_str();
        let supported = compare_versions(v, "1.13").is_ge() && compare_versions(v, "2.0").is_lt();
        if supported && !versions.iter().any(|existing| existing == v) {
            versions.push(v.to_string());
        }
    }
    versions.sort_by(|a, b| compare_versions(b, a));
    versions
}

/// Категории в нижнем регистре, `/` и пробелы заменяются на `-`
fn form_body(version: &str, packs: &serde_json::Map<String, serde_json::Value>) -> Result<String> {
    let formatted: serde_json::Map<String, serde_json::Value> = packs
        .iter()
        .map(|(category, list)| {
            let slug = category.replace(['/', ' '], "-").to_lowercase();
            (slug, list.clone())
        })
        .collect();
    let packs_json = serde_json::to_string(&formatted)?;

    Ok(format!(
        "version={}&packs={}",
        urlencoding::encode(version),
        urlencoding::encode(&packs_json)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_versions_filters_and_sorts() {
        let html = r#"<option>1.21</option><option>1.20</option><option>1.9</option>
            <option>1.13</option><span>1.21</span><p>version 1.12</p><p>1.19</p>"#;
        assert_eq!(extract_versions(html), vec!["1.21", "1.20", "1.19", "1.13"]);
        assert!(extract_versions("nothing here").is_empty());
    }

    #[test]
    fn test_form_body_slugs_categories() {
        let packs = json!({
            "Survival": ["graves"],
            "Mobs/Drops": ["more mob heads"],
            "Admin Tools": ["track raw statistics"]
        });
        let body = form_body("1.21", packs.as_object().unwrap()).unwrap();
        assert!(body.starts_with("version=1.21&packs="));

        let encoded = body.trim_start_matches("version=1.21&packs=");
        let decoded = urlencoding::decode(encoded).unwrap();
        let value: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(value["survival"], json!(["graves"]));
        assert_eq!(value["mobs-drops"], json!(["more mob heads"]));
        assert_eq!(value["admin-tools"], json!(["track raw statistics"]));
    }

    #[test]
    fn test_referer() {
        assert_eq!(
            VanillaTweaksClient::referer(PackType::Craftingtweaks),
            "https://vanillatweaks.net/picker/craftingtweaks/"
        );
    }
}
