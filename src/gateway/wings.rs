use async_trait::async_trait;
use mcpanel_core::{AddonError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{FileEntry, ProcessState, PowerSignal, PullOptions, ServerGateway};
use crate::config::DaemonConfig;
use crate::utils::excerpt;

#[derive(Debug, Serialize)]
struct PullBody<'a> {
    url: &'a str,
    root: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
    use_header: bool,
    foreground: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ServerDetails {
    state: ProcessState,
}

/// Клиент HTTP API демона узла (Wings)
pub struct WingsGateway {
    client: Client,
    base_url: String,
    token: String,
}

impl WingsGateway {
    pub fn new(config: &DaemonConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            // pull с foreground ждёт окончания загрузки
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AddonError::InvalidConfig(format!("Failed to create daemon client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, server: &str, path: &str) -> String {
        format!("{}/api/servers/{}{}", self.base_url, server, path)
    }

    fn with_query(&self, server: &str, path: &str, key: &str, value: &str) -> Result<String> {
        reqwest::Url::parse_with_params(&self.url(server, path), &[(key, value)])
            .map(|u| u.to_string())
            .map_err(|e| AddonError::Gateway(format!("Invalid daemon URL: {}", e)))
    }

    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AddonError::Gateway(format!("{}: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        log::error!("Daemon rejected {} with HTTP {}: {}", what, status, excerpt(&body));
        match status.as_u16() {
            404 => Err(AddonError::NotFound(format!("{}: {}", what, excerpt(&body)))),
            _ => Err(AddonError::Gateway(format!("{} failed with HTTP {}", what, status))),
        }
    }

    async fn post_json<T: Serialize + ?Sized>(&self, what: &str, url: String, body: &T) -> Result<()> {
        self.send(what, self.client.post(url).json(body)).await?;
        Ok(())
    }
}

#[async_trait]
impl ServerGateway for WingsGateway {
    async fn get_directory(&self, server: &str, path: &str) -> Result<Vec<FileEntry>> {
        let url = self.with_query(server, "/files/list-directory", "directory", path)?;
        let response = self.send("list-directory", self.client.get(url)).await?;
        response
            .json()
            .await
            .map_err(|e| AddonError::Gateway(format!("Invalid directory listing: {}", e)))
    }

    async fn get_content(&self, server: &str, path: &str) -> Result<String> {
        let url = self.with_query(server, "/files/contents", "file", path)?;
        let response = self.send("contents", self.client.get(url)).await?;
        response
            .text()
            .await
            .map_err(|e| AddonError::Gateway(format!("Failed to read {}: {}", path, e)))
    }

    async fn put_content(&self, server: &str, path: &str, content: Vec<u8>) -> Result<()> {
        let url = self.with_query(server, "/files/write", "file", path)?;
        self.send("write", self.client.post(url).body(content)).await?;
        Ok(())
    }

    async fn pull(&self, server: &str, url: &str, directory: &str, options: &PullOptions) -> Result<()> {
        let body = PullBody {
            url,
            root: directory,
            file_name: options.filename.as_deref(),
            use_header: options.use_header,
            foreground: options.foreground,
            headers: &options.headers,
        };
        self.post_json("pull", self.url(server, "/files/pull"), &body).await
    }

    async fn decompress_file(&self, server: &str, root: &str, file: &str) -> Result<()> {
        let body = serde_json::json!({ "root": root, "file": file });
        self.post_json("decompress", self.url(server, "/files/decompress"), &body)
            .await
    }

    async fn delete_files(&self, server: &str, root: &str, files: &[String]) -> Result<()> {
        let body = serde_json::json!({ "root": root, "files": files });
        self.post_json("delete", self.url(server, "/files/delete"), &body).await
    }

    async fn create_directory(&self, server: &str, name: &str, parent: &str) -> Result<()> {
        let body = serde_json::json!({ "name": name, "path": parent });
        self.post_json("create-directory", self.url(server, "/files/create-directory"), &body)
            .await
    }

    async fn send_power(&self, server: &str, signal: PowerSignal) -> Result<()> {
        let body = serde_json::json!({ "action": signal.as_str() });
        self.post_json("power", self.url(server, "/power"), &body).await
    }

    async fn get_state(&self, server: &str) -> Result<ProcessState> {
        let response = self.send("details", self.client.get(self.url(server, ""))).await?;
        let details: ServerDetails = response
            .json()
            .await
            .map_err(|e| AddonError::Gateway(format!("Invalid server details: {}", e)))?;
        Ok(details.state)
    }
}
