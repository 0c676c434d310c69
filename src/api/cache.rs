use mcpanel_core::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Запись в кеше с временем истечения
struct CacheEntry {
    data: String, // Сериализованные данные (JSON)
    expires_at: Instant,
}

/// TTL (время жизни) для разных типов данных
#[derive(Clone, Copy, Debug)]
pub enum CacheTTL {
    /// Метаданные удалённого файла (1 минута)
    Probe,
    /// Списки версий и каталоги паков (1 час)
    Long,
    /// Справочники площадок, например список загрузчиков (24 часа)
    Static,
    /// Пользовательский TTL
    Custom(Duration),
}

impl CacheTTL {
    pub fn duration(&self) -> Duration {
        match self {
            CacheTTL::Probe => Duration::from_secs(60),
            CacheTTL::Long => Duration::from_secs(60 * 60),
            CacheTTL::Static => Duration::from_secs(24 * 60 * 60),
            CacheTTL::Custom(d) => *d,
        }
    }
}

/// Потокобезопасный кеш для медленно меняющихся ответов площадок
#[derive(Clone)]
pub struct ApiCache {
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
}

impl ApiCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            max_entries,
        }
    }

    /// Получает значение из кеша если оно есть и не истекло
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.read().await;

        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                serde_json::from_str(&entry.data).ok()
            }
            _ => None,
        }
    }

    /// Сохраняет значение в кеш
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: CacheTTL) {
        let data = match serde_json::to_string(value) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Failed to serialize cache value: {}", e);
                return;
            }
        };

        let entry = CacheEntry {
            data,
            expires_at: Instant::now() + ttl.duration(),
        };

        let mut cache = self.cache.write().await;

        if cache.len() >= self.max_entries {
            let now = Instant::now();
            cache.retain(|_, entry| entry.expires_at > now);

            // Если всё ещё много - удаляем четверть самых старых
            if cache.len() >= self.max_entries {
                let mut entries: Vec<_> = cache
                    .iter()
                    .map(|(k, v)| (k.clone(), v.expires_at))
                    .collect();
                entries.sort_by_key(|(_, exp)| *exp);
                for (key, _) in entries.into_iter().take((self.max_entries / 4).max(1)) {
                    cache.remove(&key);
                }
            }
        }

        cache.insert(key.to_string(), entry);
    }

    /// Получает значение из кеша или выполняет функцию для получения данных.
    /// Ошибки не кешируются.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: CacheTTL, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            log::debug!("Cache hit for: {}", key);
            return Ok(cached);
        }

        log::debug!("Cache miss for: {}", key);
        let data = fetch().await?;
        self.set(key, &data, ttl).await;
        Ok(data)
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.write().await.remove(key);
    }
}

impl Default for ApiCache {
    fn default() -> Self {
        Self::new(1000)
    }
}
