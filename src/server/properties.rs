//! server.properties parser and editor
//!
//! The file lives on the daemon, so it is read and written as text.
//! Comments and line order survive an edit.

use mcpanel_core::Result;
use std::collections::HashMap;

use crate::gateway::ServerGateway;

pub const PROPERTIES_FILE: &str = "server.properties";
pub const DEFAULT_LEVEL_NAME: &str = "world";

/// Parsed server.properties file
#[derive(Debug, Clone, Default)]
pub struct ServerProperties {
    properties: HashMap<String, String>,
    /// Original lines for preserving comments and order
    lines: Vec<PropertyLine>,
}

#[derive(Debug, Clone)]
enum PropertyLine {
    Comment(String),
    Property { key: String, value: String },
    Empty,
}

impl ServerProperties {
    pub fn parse(raw: &str) -> Self {
        let mut properties = HashMap::new();
        let mut lines = Vec::new();

        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                lines.push(PropertyLine::Empty);
            } else if trimmed.starts_with('#') {
                lines.push(PropertyLine::Comment(line.to_string()));
            } else if let Some((key, value)) = trimmed.split_once('=') {
                let key = key.trim().to_string();
                let value = value.trim().to_string();
                properties.insert(key.clone(), value.clone());
                lines.push(PropertyLine::Property { key, value });
            }
        }

        Self { properties, lines }
    }

    /// Текст файла с обновлёнными значениями
    pub fn render(&self) -> String {
        let mut output = String::new();
        for line in &self.lines {
            match line {
                PropertyLine::Comment(c) => output.push_str(c),
                PropertyLine::Empty => {}
                PropertyLine::Property { key, value } => {
                    output.push_str(key);
                    output.push('=');
                    output.push_str(value);
                }
            }
            output.push('\n');
        }
        output
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.properties.get(key)
    }

    /// Set a property value, appending it when the key is new
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        let existing = self.lines.iter_mut().find_map(|line| match line {
            PropertyLine::Property { key: k, value: v } if *k == key => Some(v),
            _ => None,
        });
        match existing {
            Some(v) => *v = value.clone(),
            None => self.lines.push(PropertyLine::Property {
                key: key.clone(),
                value: value.clone(),
            }),
        }

        self.properties.insert(key, value);
    }

    pub fn level_name(&self) -> String {
        self.get("level-name")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_LEVEL_NAME.to_string())
    }

    pub fn motd(&self) -> Option<&str> {
        self.get("motd").map(String::as_str)
    }
}

/// Читает server.properties с демона
pub async fn load_properties(gateway: &dyn ServerGateway, server: &str) -> Result<ServerProperties> {
    let raw = gateway.get_content(server, PROPERTIES_FILE).await?;
    Ok(ServerProperties::parse(&raw))
}

pub async fn save_properties(
    gateway: &dyn ServerGateway,
    server: &str,
    properties: &ServerProperties,
) -> Result<()> {
    gateway
        .put_content(server, PROPERTIES_FILE, properties.render().into_bytes())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#Minecraft server properties\n#Mon Nov 24 10:00:00 UTC 2025\n\nmotd=A Minecraft Server 1.21.1\nlevel-name=survival\nserver-port=25565\n";

    #[test]
    fn test_parse_and_read() {
        let props = ServerProperties::parse(SAMPLE);
        assert_eq!(props.level_name(), "survival");
        assert_eq!(props.motd(), Some("A Minecraft Server 1.21.1"));
        assert_eq!(props.get("server-port").map(String::as_str), Some("25565"));
    }

    #[test]
    fn test_set_preserves_comments_and_order() {
        let mut props = ServerProperties::parse(SAMPLE);
        props.set("level-name", "creative");
        props.set("pvp", "false");

        let rendered = props.render();
        assert!(rendered.starts_with("#Minecraft server properties\n#Mon Nov 24"));
        assert!(rendered.contains("\nlevel-name=creative\nserver-port=25565\npvp=false\n"));
        assert!(!rendered.contains("survival"));
    }

    #[test]
    fn test_level_name_default() {
        assert_eq!(ServerProperties::parse("").level_name(), "world");
        assert_eq!(ServerProperties::parse("level-name=\n").level_name(), "world");
    }
}
