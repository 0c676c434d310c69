//! Разворачивание цепочек редиректов и метаданные удалённых архивов.
//!
//! Тело файла никогда не скачивается: только HEAD-запросы без автоматического
//! следования редиректам.

use async_trait::async_trait;
use mcpanel_core::{AddonError, DownloadSpec, Result};
use regex::Regex;
use reqwest::{redirect, Client, Url};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

use crate::api::cache::{ApiCache, CacheTTL};

pub const DEFAULT_MAX_HOPS: usize = 5;
/// Всё, что меньше, почти наверняка HTML-страница, а не архив
const MIN_ARCHIVE_SIZE: u64 = 1024;

/// Заголовки ответа, важные для резолвера
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResponse {
    pub location: Option<String>,
    pub content_disposition: Option<String>,
    pub content_length: Option<u64>,
}

#[async_trait]
pub trait HeadProbe: Send + Sync {
    async fn head(&self, url: &str) -> Result<HeadResponse>;
}

/// HEAD через reqwest, редиректы не выполняются автоматически
pub struct HttpHeadProbe {
    client: Client,
}

impl HttpHeadProbe {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AddonError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HeadProbe for HttpHeadProbe {
    async fn head(&self, url: &str) -> Result<HeadResponse> {
        let response = self.client.head(url).send().await?;
        let header = |name: &str| {
            response
                .headers()
                .get_all(name)
                .iter()
                .last()
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };

        Ok(HeadResponse {
            location: header("location"),
            content_disposition: header("content-disposition"),
            content_length: header("content-length").and_then(|v| v.trim().parse().ok()),
        })
    }
}

/// Следует по `Location` не более `max_hops` раз и возвращает последний URL.
///
/// Не возвращает ошибку: если хост не резолвится или запрос падает,
/// результатом будет текущий URL.
pub async fn resolve_final_url(probe: &dyn HeadProbe, url: &str, max_hops: usize) -> String {
    let mut current = url.to_string();
    let mut previous: Option<String> = None;

    for hop in 0..=max_hops {
        if let Some(prev) = &previous {
            match absolutize(prev, &current) {
                Some(absolute) => current = absolute,
                None => {
                    log::warn!("Cannot resolve relative redirect {} against {}", current, prev);
                    return prev.clone();
                }
            }
        }

        if hop == max_hops {
            log::debug!("Redirect limit ({}) reached at {}", max_hops, current);
            break;
        }

        let location = match probe.head(&current).await {
            Ok(head) => head.location,
            Err(e) => {
                log::warn!("Failed to query {} while following redirects: {}", current, e);
                None
            }
        };

        match location {
            Some(next) => {
                previous = Some(std::mem::replace(&mut current, next));
            }
            None => break,
        }
    }

    current
}

/// Относительный Location разрешается от схемы и хоста предыдущего URL
fn absolutize(previous: &str, location: &str) -> Option<String> {
    if Url::parse(location).is_ok() {
        return Some(location.to_string());
    }
    let base = Url::parse(previous).ok()?;
    base.host_str()?;
    base.join(location).ok().map(|u| u.to_string())
}

/// Что удалось узнать о файле до скачивания
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    pub filename: String,
    pub size: u64,
}

/// Имя и размер архива по финальному URL. Результат кешируется на минуту.
pub async fn probe_remote_file(
    probe: &dyn HeadProbe,
    cache: &ApiCache,
    spec: &DownloadSpec,
) -> Result<RemoteFileInfo> {
    let key = format!("worlds:queryUrl:{}", spec.url);
    cache
        .get_or_fetch(&key, CacheTTL::Probe, || async {
            let final_url = resolve_final_url(probe, &spec.url, DEFAULT_MAX_HOPS).await;
            let head = probe.head(&final_url).await?;

            let filename = head
                .content_disposition
                .as_deref()
                .and_then(filename_from_disposition)
                .or_else(|| spec.filename.clone())
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| url_basename(&spec.url));

            match head.content_length {
                Some(size) if size > MIN_ARCHIVE_SIZE => Ok(RemoteFileInfo { filename, size }),
                _ => Err(AddonError::Validation(
                    "Failed to determine file size. Make sure the url is a direct link to the file."
                        .into(),
                )),
            }
        })
        .await
}

/// `filename="a.zip"`, `filename=a.zip` и `filename*=UTF-8''a%20b.zip`
pub fn filename_from_disposition(header: &str) -> Option<String> {
    static DISPOSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"filename(\*)?=(UTF-8'')?"?([^";]+)"?;?"#).expect("valid disposition regex")
    });
    let raw = DISPOSITION_RE.captures(header)?.get(3)?.as_str().trim();
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(decoded).filter(|s| !s.is_empty())
}

fn url_basename(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Заранее заданные ответы на HEAD
    #[derive(Default)]
    pub struct ScriptedProbe {
        pub responses: HashMap<String, HeadResponse>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        pub fn redirect(mut self, from: &str, to: &str) -> Self {
            self.responses.insert(
                from.to_string(),
                HeadResponse {
                    location: Some(to.to_string()),
                    ..Default::default()
                },
            );
            self
        }

        pub fn file(mut self, url: &str, disposition: Option<&str>, length: u64) -> Self {
            self.responses.insert(
                url.to_string(),
                HeadResponse {
                    location: None,
                    content_disposition: disposition.map(|d| d.to_string()),
                    content_length: Some(length),
                },
            );
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }
    }

    #[async_trait]
    impl HeadProbe for ScriptedProbe {
        async fn head(&self, url: &str) -> Result<HeadResponse> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(url.to_string());
            }
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| AddonError::Api(format!("could not resolve host for {}", url)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedProbe;
    use super::*;

    #[tokio::test]
    async fn test_follows_chain_to_final_url() {
        let probe = ScriptedProbe::default()
            .redirect("https://a.example/start", "https://b.example/next")
            .redirect("https://b.example/next", "/files/world.zip")
            .file("https://b.example/files/world.zip", None, 4096);

        let url = resolve_final_url(&probe, "https://a.example/start", DEFAULT_MAX_HOPS).await;
        assert_eq!(url, "https://b.example/files/world.zip");
    }

    #[tokio::test]
    async fn test_cycle_terminates_at_hop_limit() {
        let probe = ScriptedProbe::default()
            .redirect("https://a.example/", "https://b.example/")
            .redirect("https://b.example/", "https://a.example/");

        let url = resolve_final_url(&probe, "https://a.example/", 5).await;
        assert!(url == "https://a.example/" || url == "https://b.example/");
        assert_eq!(probe.call_count(), 5);
    }

    #[tokio::test]
    async fn test_unreachable_host_returns_current() {
        let probe = ScriptedProbe::default().redirect("https://a.example/", "https://gone.invalid/x");
        let url = resolve_final_url(&probe, "https://a.example/", 5).await;
        assert_eq!(url, "https://gone.invalid/x");
    }

    #[tokio::test]
    async fn test_zero_hops_returns_input() {
        let probe = ScriptedProbe::default();
        let url = resolve_final_url(&probe, "https://a.example/", 0).await;
        assert_eq!(url, "https://a.example/");
        assert_eq!(probe.call_count(), 0);
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="Skyblock.zip""#).as_deref(),
            Some("Skyblock.zip")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''Sky%20Island%20v2.zip").as_deref(),
            Some("Sky Island v2.zip")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn test_url_basename() {
        assert_eq!(url_basename("https://cdn.example/a/b/world.zip?x=1"), "world.zip");
        assert_eq!(url_basename("https://cdn.example/"), "");
    }

    #[tokio::test]
    async fn test_probe_remote_file() {
        let spec = DownloadSpec::direct("https://www.curseforge.com/api/v1/mods/1/files/2/download")
            .with_filename("world_1_2.zip");
        let probe = ScriptedProbe::default()
            .redirect(&spec.url, "https://edge.forgecdn.net/files/2/skyblock.zip")
            .file("https://edge.forgecdn.net/files/2/skyblock.zip", None, 5_000_000);
        let cache = ApiCache::default();

        let info = probe_remote_file(&probe, &cache, &spec).await.unwrap();
        assert_eq!(info.filename, "world_1_2.zip");
        assert_eq!(info.size, 5_000_000);

        // Второй запрос берётся из кеша
        let calls = probe.call_count();
        probe_remote_file(&probe, &cache, &spec).await.unwrap();
        assert_eq!(probe.call_count(), calls);
    }

    #[tokio::test]
    async fn test_probe_rejects_small_files() {
        let spec = DownloadSpec::direct("https://example.com/page");
        let probe = ScriptedProbe::default().file(
            "https://example.com/page",
            Some(r#"attachment; filename="index.html""#),
            512,
        );
        let err = probe_remote_file(&probe, &ApiCache::default(), &spec)
            .await
            .unwrap_err();
        assert!(matches!(err, AddonError::Validation(_)));
    }
}
