//! Контракты внешних систем: демон узла (файлы и питание сервера) и
//! application API панели (профиль запуска, переустановка).
//!
//! Все пути на стороне демона относительны корню сервера.

pub mod panel;
pub mod wings;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use mcpanel_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Запись из листинга каталога
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default = "default_true")]
    pub file: bool,
    #[serde(default)]
    pub mime: String,
}

fn default_true() -> bool {
    true
}

impl FileEntry {
    pub fn is_directory(&self) -> bool {
        !self.file || self.mime == "inode/directory"
    }

    pub fn is_jar(&self) -> bool {
        self.mime == "application/java-archive" || self.name.to_lowercase().ends_with(".jar")
    }
}

/// Параметры `pull`: демон сам скачивает файл по ссылке
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOptions {
    pub filename: Option<String>,
    /// Имя файла брать из Content-Disposition
    pub use_header: bool,
    /// Ждать окончания загрузки до ответа
    pub foreground: bool,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSignal {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Kill => "kill",
        }
    }
}

/// Состояние процесса по данным демона
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Offline,
    Starting,
    Running,
    Stopping,
    #[serde(other)]
    Unknown,
}

#[async_trait]
pub trait ServerGateway: Send + Sync {
    async fn get_directory(&self, server: &str, path: &str) -> Result<Vec<FileEntry>>;

    async fn get_content(&self, server: &str, path: &str) -> Result<String>;

    async fn put_content(&self, server: &str, path: &str, content: Vec<u8>) -> Result<()>;

    async fn pull(&self, server: &str, url: &str, directory: &str, options: &PullOptions) -> Result<()>;

    async fn decompress_file(&self, server: &str, root: &str, file: &str) -> Result<()>;

    async fn delete_files(&self, server: &str, root: &str, files: &[String]) -> Result<()>;

    async fn create_directory(&self, server: &str, name: &str, parent: &str) -> Result<()>;

    async fn send_power(&self, server: &str, signal: PowerSignal) -> Result<()>;

    async fn get_state(&self, server: &str) -> Result<ProcessState>;
}

/// Egg, команда запуска и образ сервера
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupProfile {
    pub egg_id: u64,
    pub startup: String,
    pub image: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[async_trait]
pub trait PanelServers: Send + Sync {
    async fn startup_profile(&self, server: &str) -> Result<StartupProfile>;

    /// Переводит сервер на другой egg с заданными переменными, команда и образ не меняются
    async fn switch_egg(&self, server: &str, egg_id: u64, environment: &BTreeMap<String, String>) -> Result<()>;

    /// Дописывает переменные окружения к текущему профилю
    async fn update_environment(&self, server: &str, environment: &BTreeMap<String, String>) -> Result<()>;

    /// Возвращает сохранённый профиль как есть
    async fn restore_profile(&self, server: &str, profile: &StartupProfile) -> Result<()>;

    async fn reinstall(&self, server: &str) -> Result<()>;

    async fn is_installing(&self, server: &str) -> Result<bool>;
}

/// Имена всех записей в корне сервера
pub async fn root_file_names(gateway: &dyn ServerGateway, server: &str) -> Result<Vec<String>> {
    Ok(gateway
        .get_directory(server, "/")
        .await?
        .into_iter()
        .map(|e| e.name)
        .collect())
}
