use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Content model
// ============================================================================

/// Результат поиска, не зависящий от платформы
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub icon_url: Option<String>,
}

/// Версия (файл) проекта
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVersion {
    pub id: String,
    pub name: String,
}

/// Страница результатов поиска
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<ContentItem>,
    pub total: u64,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Цель скачивания. Для простых файлов достаточно `url`, архивы миров
/// требуют имя файла и заголовки, которые демон передаст источнику.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSpec {
    pub url: String,
    pub filename: Option<String>,
    pub use_header: bool,
    pub foreground: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl DownloadSpec {
    /// Прямая ссылка на файл без дополнительных опций
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
            use_header: false,
            foreground: false,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// Providers and content domains
// ============================================================================

/// Supported content platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Modrinth,
    CurseForge,
    FeedTheBeast,
    SpigotMc,
    Hangar,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modrinth => "modrinth",
            Self::CurseForge => "curseforge",
            Self::FeedTheBeast => "feedthebeast",
            Self::SpigotMc => "spigotmc",
            Self::Hangar => "hangar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "modrinth" => Some(Self::Modrinth),
            "curseforge" => Some(Self::CurseForge),
            "feedthebeast" => Some(Self::FeedTheBeast),
            "spigotmc" => Some(Self::SpigotMc),
            "hangar" => Some(Self::Hangar),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromSql for ProviderKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        ProviderKind::parse(raw).ok_or_else(|| {
            FromSqlError::Other(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown ProviderKind: {}", raw),
            )))
        })
    }
}

impl ToSql for ProviderKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Раздел каталога: у каждого свой набор платформ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Mod,
    Plugin,
    Modpack,
    World,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mod => "mod",
            Self::Plugin => "plugin",
            Self::Modpack => "modpack",
            Self::World => "world",
        }
    }

    /// Каталог на сервере, куда кладутся файлы (только для модов и плагинов)
    pub fn install_dir(&self) -> Option<&'static str> {
        match self {
            Self::Mod => Some("mods"),
            Self::Plugin => Some("plugins"),
            Self::Modpack | Self::World => None,
        }
    }
}

// ============================================================================
// Jobs and progress
// ============================================================================

/// Kind of background installation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Mod,
    Plugin,
    Modpack,
    Datapack,
    World,
    VersionSwitch,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mod => "mod",
            Self::Plugin => "plugin",
            Self::Modpack => "modpack",
            Self::Datapack => "datapack",
            Self::World => "world",
            Self::VersionSwitch => "version_switch",
        }
    }

    /// Ключ записи прогресса для задачи
    pub fn progress_key(&self, job_id: &str) -> String {
        match self {
            Self::World => format!("world_download:{}", job_id),
            _ => format!("install:{}", job_id),
        }
    }
}

/// Статус, который видит клиент при опросе
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Downloading,
    Completed,
    Failed,
    Timeout,
    NotFound,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
        }
    }

    /// После терминального статуса запись больше не меняется
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }
}

/// Internal phase of an orchestrated job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Preparing,
    Transferring,
    Decompressing,
    Finalizing,
    Completed,
    Failed,
    Timeout,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Preparing => "preparing",
            Self::Transferring => "transferring",
            Self::Decompressing => "decompressing",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }
}

/// Запись о ходе установки, хранится с ограниченным временем жизни
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub download_id: String,
    pub status: JobStatus,
    pub filename: String,
    pub server_id: String,
    #[serde(default)]
    pub decompressed: bool,
    pub error: Option<String>,
}

impl ProgressRecord {
    pub fn new(
        download_id: impl Into<String>,
        server_id: impl Into<String>,
        filename: impl Into<String>,
        status: JobStatus,
    ) -> Self {
        Self {
            download_id: download_id.into(),
            status,
            filename: filename.into(),
            server_id: server_id.into(),
            decompressed: false,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn decompressed(mut self) -> Self {
        self.decompressed = true;
        self
    }
}

// ============================================================================
// History & server records
// ============================================================================

/// Последняя установка модпака на сервер
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub server_id: String,
    pub provider: ProviderKind,
    pub modpack_id: String,
    pub name: String,
    pub version_id: String,
    pub icon_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Данные для upsert в историю
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub server_id: String,
    pub provider: ProviderKind,
    pub modpack_id: String,
    pub name: String,
    pub version_id: String,
    pub icon_url: Option<String>,
}

/// Installed server software as recorded for a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinecraftVersion {
    #[serde(rename = "type")]
    pub minecraft_type: String,
    #[serde(rename = "version")]
    pub minecraft_version: String,
    #[serde(rename = "build")]
    pub minecraft_build: String,
}

impl MinecraftVersion {
    pub fn new(
        minecraft_type: impl Into<String>,
        minecraft_version: impl Into<String>,
        minecraft_build: impl Into<String>,
    ) -> Self {
        Self {
            minecraft_type: minecraft_type.into(),
            minecraft_version: minecraft_version.into(),
            minecraft_build: minecraft_build.into(),
        }
    }
}

// ============================================================================
// Config files & packs
// ============================================================================

/// Формат конфигурационного файла сервера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfigFormat {
    Properties,
    Yaml,
    Toml,
    Json5,
    Conf,
}

impl ConfigFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Properties => "PROPERTIES",
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Json5 => "JSON5",
            Self::Conf => "CONF",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PROPERTIES" => Some(Self::Properties),
            "YAML" | "YML" => Some(Self::Yaml),
            "TOML" => Some(Self::Toml),
            "JSON5" => Some(Self::Json5),
            "CONF" => Some(Self::Conf),
            _ => None,
        }
    }
}

/// VanillaTweaks pack family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackType {
    Datapacks,
    Resourcepacks,
    Craftingtweaks,
}

impl PackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Datapacks => "datapacks",
            Self::Resourcepacks => "resourcepacks",
            Self::Craftingtweaks => "craftingtweaks",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "datapacks" => Some(Self::Datapacks),
            "resourcepacks" => Some(Self::Resourcepacks),
            "craftingtweaks" => Some(Self::Craftingtweaks),
            _ => None,
        }
    }

    /// Короткий префикс для json-каталогов VanillaTweaks
    pub fn catalog_prefix(&self) -> &'static str {
        match self {
            Self::Datapacks => "dp",
            Self::Resourcepacks => "rp",
            Self::Craftingtweaks => "ct",
        }
    }
}
