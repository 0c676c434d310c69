use serde::Serialize;
use thiserror::Error;

/// Информация об ошибке с подсказкой для восстановления
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Код ошибки для идентификации
    pub code: String,
    /// Человекочитаемое сообщение
    pub message: String,
    /// Подсказка для исправления
    pub recovery_hint: Option<String>,
    /// Технические детали (для логов)
    pub details: Option<String>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_hint: None,
            details: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum AddonError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Не удалось получить ссылку на скачивание. Установка прерывается.
    #[error("Failed to resolve download from {provider}: {reason}")]
    DownloadResolution { provider: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Ошибка файловых/питающих операций демона
    #[error("Daemon operation failed: {0}")]
    Gateway(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("Join error: {0}")]
    Join(String),
}

impl AddonError {
    pub fn resolution(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        AddonError::DownloadResolution {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Возвращает информацию об ошибке с подсказкой для восстановления
    pub fn to_error_info(&self) -> ErrorInfo {
        match self {
            AddonError::Database(e) => ErrorInfo::new("DATABASE_ERROR", "Database error")
                .with_hint("Check that the database file is writable. If the error persists, restore it from a backup")
                .with_details(e.to_string()),
            AddonError::Io(e) => ErrorInfo::new("IO_ERROR", format!("Filesystem error: {}", e.kind()))
                .with_details(e.to_string()),
            AddonError::Http(e) => {
                let (message, hint) = if e.is_timeout() {
                    ("Upstream timeout", "The content platform did not answer in time. Try again")
                } else if e.is_connect() {
                    ("Failed to connect to upstream", "The content platform might be temporarily unavailable")
                } else if e.status().map(|s| s.as_u16()) == Some(429) {
                    ("Rate limit exceeded", "Wait a minute and try again")
                } else if e.status().map(|s| s.as_u16()) == Some(404) {
                    ("Resource not found", "The project or file may have been removed")
                } else {
                    ("Network error", "Check the outbound connectivity of the panel host")
                };
                ErrorInfo::new("HTTP_ERROR", message)
                    .with_hint(hint)
                    .with_details(e.to_string())
            }
            AddonError::Json(e) => ErrorInfo::new("JSON_ERROR", "Data processing error")
                .with_hint("The upstream API may have changed")
                .with_details(e.to_string()),
            AddonError::DownloadResolution { provider, reason } => {
                ErrorInfo::new("DOWNLOAD_RESOLUTION_FAILED", format!("Could not resolve a download from {}", provider))
                    .with_hint("Pick another version or try again later")
                    .with_details(reason.clone())
            }
            AddonError::Validation(msg) => ErrorInfo::new("VALIDATION_ERROR", msg.clone()),
            AddonError::Gateway(msg) => ErrorInfo::new("DAEMON_ERROR", msg.clone())
                .with_hint("Make sure the node is online and the server is not suspended"),
            AddonError::Timeout(msg) => ErrorInfo::new("TIMEOUT", "Operation timed out")
                .with_details(msg.clone()),
            AddonError::NotFound(what) => ErrorInfo::new("NOT_FOUND", format!("Not found: {}", what)),
            AddonError::Conflict(msg) => ErrorInfo::new("CONFLICT", msg.clone())
                .with_hint("Wait for the running operation to finish"),
            AddonError::InvalidConfig(msg) => ErrorInfo::new("INVALID_CONFIG", "Invalid configuration")
                .with_hint("Check mcpanel.toml and the MCPANEL_* environment variables")
                .with_details(msg.clone()),
            AddonError::Api(msg) => ErrorInfo::new("API_ERROR", msg.clone()),
            AddonError::Image(msg) => ErrorInfo::new("IMAGE_ERROR", "Could not process the image")
                .with_hint("Upload a PNG, JPEG, GIF or WebP image")
                .with_details(msg.clone()),
            AddonError::Join(msg) => ErrorInfo::new("INTERNAL_ERROR", "Background task failed")
                .with_details(msg.clone()),
        }
    }
}

impl From<tokio::task::JoinError> for AddonError {
    fn from(err: tokio::task::JoinError) -> Self {
        AddonError::Join(err.to_string())
    }
}

impl Serialize for AddonError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_error_info().serialize(serializer)
    }
}

pub type Result<T> = std::result::Result<T, AddonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_info() {
        let err = AddonError::resolution("modrinth", "version has no files");
        let info = err.to_error_info();
        assert_eq!(info.code, "DOWNLOAD_RESOLUTION_FAILED");
        assert_eq!(info.details.as_deref(), Some("version has no files"));
        assert!(err.to_string().contains("modrinth"));
    }

    #[test]
    fn test_serializes_as_error_info() {
        let err = AddonError::Validation("page must be at least 1".into());
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "VALIDATION_ERROR");
        assert_eq!(value["message"], "page must be at least 1");
    }
}
