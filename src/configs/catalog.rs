use mcpanel_core::ConfigFormat;
use serde::Serialize;

/// Конфиг, который умеет показывать редактор
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    pub file: &'static str,
    #[serde(rename = "type")]
    pub server_type: &'static str,
    pub format: ConfigFormat,
}

/// Неизменяемая таблица файл → формат
#[derive(Debug, Clone)]
pub struct ConfigCatalog {
    entries: Vec<ConfigEntry>,
}

impl ConfigCatalog {
    pub fn new(entries: Vec<ConfigEntry>) -> Self {
        Self { entries }
    }

    pub fn minecraft() -> Self {
        use ConfigFormat::*;
        let table: [(&'static str, &'static str, ConfigFormat); 27] = [
            ("server.properties", "VANILLA", Properties),
            ("spigot.yml", "SPIGOT", Yaml),
            ("bukkit.yml", "SPIGOT", Yaml),
            ("paper.yml", "PAPER", Yaml),
            ("config/paper-global.yml", "PAPER", Yaml),
            ("config/paper-world-defaults.yml", "PAPER", Yaml),
            ("pufferfish.yml", "PUFFERFISH", Yaml),
            ("purpur.yml", "PURPUR", Yaml),
            ("leaves.yml", "LEAVES", Yaml),
            ("canvas.yml", "CANVAS", Yaml),
            ("config/canvas-server.json5", "CANVAS", Json5),
            ("divinemc.yml", "DIVINEMC", Yaml),
            ("config/sponge/global.conf", "SPONGE", Conf),
            ("config/sponge/sponge.conf", "SPONGE", Conf),
            ("config/sponge/tracker.conf", "SPONGE", Conf),
            ("arclight.conf", "ARCLIGHT", Conf),
            ("config/neoforge-server.toml", "NEOFORGE", Toml),
            ("config/neoforge-common.toml", "NEOFORGE", Toml),
            ("mohist-config/mohist.yml", "MOHIST", Yaml),
            ("velocity.toml", "VELOCITY", Toml),
            ("config.yml", "BUNGEECORD", Yaml),
            ("waterfall.yml", "WATERFALL", Yaml),
            ("settings.yml", "NANOLIMBO", Yaml),
            ("magma.yml", "MAGMA", Yaml),
            ("config/leaf-global.yml", "LEAF", Yaml),
            ("config/gale-global.yml", "LEAF", Yaml),
            ("config/gale-world-defaults.yml", "LEAF", Yaml),
        ];

        Self::new(
            table
                .into_iter()
                .map(|(file, server_type, format)| ConfigEntry {
                    file,
                    server_type,
                    format,
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn find(&self, file: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|e| e.file == file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minecraft_catalog() {
        let catalog = ConfigCatalog::minecraft();
        assert_eq!(catalog.entries().len(), 27);
        assert_eq!(catalog.find("velocity.toml").unwrap().format, ConfigFormat::Toml);
        assert_eq!(catalog.find("config/sponge/global.conf").unwrap().server_type, "SPONGE");
        assert!(catalog.find("eula.txt").is_none());
    }

    #[test]
    fn test_entry_serialization() {
        let catalog = ConfigCatalog::minecraft();
        let value = serde_json::to_value(catalog.find("server.properties").unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"file": "server.properties", "type": "VANILLA", "format": "PROPERTIES"})
        );
    }
}
