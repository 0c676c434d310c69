//! Addon configuration: `mcpanel.toml` plus `MCPANEL_*` environment overrides.

use mcpanel_core::{AddonError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Base URL of the node daemon (Wings)
    pub url: String,
    pub token: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Base URL of the panel application API
    pub url: String,
    pub api_key: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonConfig {
    pub bind: String,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub curseforge_api_key: String,
    pub daemon: DaemonConfig,
    pub panel: PanelConfig,
    /// Egg that installs modpacks. 0 means not configured.
    pub installer_egg_id: u64,
    pub job_workers: usize,
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8095".to_string(),
            database_path: PathBuf::from("mcpanel.db"),
            log_dir: PathBuf::from("logs"),
            curseforge_api_key: String::new(),
            daemon: DaemonConfig::default(),
            panel: PanelConfig::default(),
            installer_egg_id: 0,
            job_workers: 4,
        }
    }
}

impl AddonConfig {
    /// Reads `MCPANEL_CONFIG` (default `mcpanel.toml`) and applies env overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var("MCPANEL_CONFIG").unwrap_or_else(|_| "mcpanel.toml".to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Missing file yields defaults, a malformed one is an error
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AddonError::InvalidConfig(e.to_string()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MCPANEL_BIND") {
            self.bind = v;
        }
        if let Some(v) = lookup("MCPANEL_DB") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MCPANEL_LOG_DIR") {
            self.log_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CURSEFORGE_API_KEY") {
            self.curseforge_api_key = v;
        }
        if let Some(v) = lookup("MCPANEL_DAEMON_URL") {
            self.daemon.url = v;
        }
        if let Some(v) = lookup("MCPANEL_DAEMON_TOKEN") {
            self.daemon.token = v;
        }
        if let Some(v) = lookup("MCPANEL_PANEL_URL") {
            self.panel.url = v;
        }
        if let Some(v) = lookup("MCPANEL_PANEL_KEY") {
            self.panel.api_key = v;
        }
        match lookup("MCPANEL_INSTALLER_EGG").map(|v| v.parse::<u64>()) {
            Some(Ok(id)) => self.installer_egg_id = id,
            Some(Err(e)) => log::warn!("Ignoring MCPANEL_INSTALLER_EGG: {}", e),
            None => {}
        }
        match lookup("MCPANEL_JOB_WORKERS").map(|v| v.parse::<usize>()) {
            Some(Ok(n)) => self.job_workers = n,
            Some(Err(e)) => log::warn!("Ignoring MCPANEL_JOB_WORKERS: {}", e),
            None => {}
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.job_workers == 0 {
            return Err(AddonError::InvalidConfig("job_workers must be at least 1".into()));
        }
        reqwest::Url::parse(&self.daemon.url)
            .map_err(|e| AddonError::InvalidConfig(format!("daemon.url: {}", e)))?;
        reqwest::Url::parse(&self.panel.url)
            .map_err(|e| AddonError::InvalidConfig(format!("panel.url: {}", e)))?;
        Ok(())
    }

    /// Installer egg, or a configuration error when it is not set
    pub fn installer_egg(&self) -> Result<u64> {
        match self.installer_egg_id {
            0 => Err(AddonError::InvalidConfig(
                "installer_egg_id (MCPANEL_INSTALLER_EGG) is not configured".into(),
            )),
            id => Ok(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AddonConfig::default();
        assert_eq!(config.bind, "127.0.0.1:8095");
        assert_eq!(config.job_workers, 4);
        assert!(config.validate().is_ok());
        assert!(matches!(config.installer_egg(), Err(AddonError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AddonConfig::from_toml(
            r#"
            installer_egg_id = 17

            [daemon]
            url = "https://node1.example.com:8080"
            "#,
        )
        .unwrap();
        assert_eq!(config.installer_egg().unwrap(), 17);
        assert_eq!(config.daemon.url, "https://node1.example.com:8080");
        assert_eq!(config.daemon.token, "");
        assert_eq!(config.panel, PanelConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MCPANEL_BIND", "0.0.0.0:9000"),
            ("CURSEFORGE_API_KEY", "cf-key"),
            ("MCPANEL_JOB_WORKERS", "8"),
            ("MCPANEL_INSTALLER_EGG", "not-a-number"),
        ]);
        let mut config = AddonConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.curseforge_api_key, "cf-key");
        assert_eq!(config.job_workers, 8);
        assert_eq!(config.installer_egg_id, 0);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AddonConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AddonConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AddonConfig::from_toml("job_workers = \"many\"").is_err());
        let config = AddonConfig {
            job_workers: 0,
            ..AddonConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
