use async_trait::async_trait;
use mcpanel_core::{AddonError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{PanelServers, StartupProfile};
use crate::config::PanelConfig;
use crate::utils::excerpt;

const STATUS_INSTALLING: &str = "installing";

#[derive(Debug, Deserialize)]
struct ServerList {
    data: Vec<ServerObject>,
}

#[derive(Debug, Deserialize)]
struct ServerObject {
    attributes: ServerAttributes,
}

#[derive(Debug, Deserialize)]
struct ServerAttributes {
    id: u64,
    egg: u64,
    status: Option<String>,
    container: ContainerAttributes,
}

#[derive(Debug, Deserialize)]
struct ContainerAttributes {
    startup_command: String,
    image: String,
    #[serde(default)]
    environment: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct StartupUpdate<'a> {
    startup: &'a str,
    environment: &'a BTreeMap<String, String>,
    egg: u64,
    image: &'a str,
    skip_scripts: bool,
}

impl ServerAttributes {
    fn profile(&self) -> StartupProfile {
        StartupProfile {
            egg_id: self.egg,
            startup: self.container.startup_command.clone(),
            image: self.container.image.clone(),
            environment: self
                .container
                .environment
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect(),
        }
    }
}

/// Application API панели. Серверы адресуются по UUID, внутренний id
/// находится фильтром.
pub struct PanelApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PanelApi {
    pub fn new(config: &PanelConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AddonError::InvalidConfig(format!("Failed to create panel client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AddonError::Gateway(format!("panel {}: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        log::error!("Panel rejected {} with HTTP {}: {}", what, status, excerpt(&body));
        Err(AddonError::Gateway(format!("panel {} failed with HTTP {}", what, status)))
    }

    async fn server(&self, uuid: &str) -> Result<ServerAttributes> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/application/servers", self.base_url),
            &[("filter[uuid]", uuid)],
        )
        .map_err(|e| AddonError::InvalidConfig(format!("panel.url: {}", e)))?;

        let list: ServerList = self
            .send("server lookup", self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| AddonError::Gateway(format!("Invalid server listing: {}", e)))?;

        list.data
            .into_iter()
            .map(|o| o.attributes)
            .next()
            .ok_or_else(|| AddonError::NotFound(format!("server {}", uuid)))
    }

    async fn patch_startup(&self, id: u64, update: &StartupUpdate<'_>) -> Result<()> {
        let url = format!("{}/api/application/servers/{}/startup", self.base_url, id);
        self.send("startup update", self.client.patch(url).json(update)).await?;
        Ok(())
    }
}

#[async_trait]
impl PanelServers for PanelApi {
    async fn startup_profile(&self, server: &str) -> Result<StartupProfile> {
        Ok(self.server(server).await?.profile())
    }

    async fn switch_egg(&self, server: &str, egg_id: u64, environment: &BTreeMap<String, String>) -> Result<()> {
        let attrs = self.server(server).await?;
        self.patch_startup(
            attrs.id,
            &StartupUpdate {
                startup: &attrs.container.startup_command,
                environment,
                egg: egg_id,
                image: &attrs.container.image,
                skip_scripts: false,
            },
        )
        .await
    }

    async fn update_environment(&self, server: &str, environment: &BTreeMap<String, String>) -> Result<()> {
        let attrs = self.server(server).await?;
        let mut profile = attrs.profile();
        profile
            .environment
            .extend(environment.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.patch_startup(
            attrs.id,
            &StartupUpdate {
                startup: &profile.startup,
                environment: &profile.environment,
                egg: profile.egg_id,
                image: &profile.image,
                skip_scripts: true,
            },
        )
        .await
    }

    async fn restore_profile(&self, server: &str, profile: &StartupProfile) -> Result<()> {
        let attrs = self.server(server).await?;
        self.patch_startup(
            attrs.id,
            &StartupUpdate {
                startup: &profile.startup,
                environment: &profile.environment,
                egg: profile.egg_id,
                image: &profile.image,
                skip_scripts: true,
            },
        )
        .await
    }

    async fn reinstall(&self, server: &str) -> Result<()> {
        let attrs = self.server(server).await?;
        let url = format!("{}/api/application/servers/{}/reinstall", self.base_url, attrs.id);
        self.send("reinstall", self.client.post(url)).await?;
        Ok(())
    }

    async fn is_installing(&self, server: &str) -> Result<bool> {
        let attrs = self.server(server).await?;
        Ok(attrs.status.as_deref() == Some(STATUS_INSTALLING))
    }
}
