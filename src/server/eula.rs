//! EULA handling for Minecraft servers
//!
//! Minecraft servers require EULA acceptance before they can run.

use mcpanel_core::Result;
use serde::{Deserialize, Serialize};

use crate::gateway::ServerGateway;

pub const EULA_FILE: &str = "eula.txt";
pub const EULA_URL: &str = "https://aka.ms/MinecraftEULA";

/// EULA acceptance status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EulaStatus {
    pub exists: bool,
    pub accepted: bool,
    pub url: String,
}

fn is_accepted(content: &str) -> bool {
    content
        .lines()
        .filter(|line| !line.trim().starts_with('#'))
        .any(|line| line.to_lowercase().replace(' ', "").contains("eula=true"))
}

/// Check EULA status for a server. A missing file counts as not accepted.
pub async fn check_eula(gateway: &dyn ServerGateway, server: &str) -> EulaStatus {
    match gateway.get_content(server, EULA_FILE).await {
        Ok(content) => EulaStatus {
            exists: true,
            accepted: is_accepted(&content),
            url: EULA_URL.to_string(),
        },
        Err(_) => EulaStatus {
            exists: false,
            accepted: false,
            url: EULA_URL.to_string(),
        },
    }
}

/// Пишет `eula=true` в корень сервера
pub async fn accept_eula(gateway: &dyn ServerGateway, server: &str) -> Result<()> {
    gateway
        .put_content(server, &format!("/{}", EULA_FILE), b"eula=true".to_vec())
        .await?;
    log::info!("EULA accepted for server {}", server);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::FakeGateway;

    #[test]
    fn test_is_accepted() {
        assert!(is_accepted("#comment\neula=true\n"));
        assert!(is_accepted("eula = TRUE"));
        assert!(!is_accepted("#eula=true\neula=false"));
    }

    #[tokio::test]
    async fn test_accept_and_check() {
        let gw = FakeGateway::new();
        assert!(!check_eula(&gw, "srv").await.exists);

        accept_eula(&gw, "srv").await.unwrap();
        assert_eq!(gw.content("eula.txt").as_deref(), Some("eula=true"));
        let status = check_eula(&gw, "srv").await;
        assert!(status.exists && status.accepted);
    }
}
