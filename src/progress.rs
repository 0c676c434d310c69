//! Хранилище прогресса установок с ограниченным временем жизни.
//!
//! Запись, достигшая терминального статуса, больше не перезаписывается.

use async_trait::async_trait;
use mcpanel_core::ProgressRecord;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const PROGRESS_TTL: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<ProgressRecord>;

    /// Сохраняет запись. `false`, если под ключом уже лежит терминальная.
    async fn put(&self, key: &str, record: ProgressRecord) -> bool;
}

#[derive(Debug, Clone)]
struct Entry {
    record: ProgressRecord,
    expires_at: Instant,
}

/// Реализация в памяти процесса
#[derive(Clone)]
pub struct MemoryProgressStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl Default for MemoryProgressStore {
    fn default() -> Self {
        Self::new(PROGRESS_TTL)
    }
}

impl MemoryProgressStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Удаляет просроченные записи
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn get(&self, key: &str) -> Option<ProgressRecord> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.record.clone())
    }

    async fn put(&self, key: &str, record: ProgressRecord) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now && existing.record.status.is_terminal() {
                log::warn!(
                    "Ignoring {} for {}: job already finished as {}",
                    record.status.as_str(),
                    key,
                    existing.record.status.as_str()
                );
                return false;
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                record,
                expires_at: now + self.ttl,
            },
        );
        true
    }
}
