use mcpanel_core::{MinecraftVersion, Result};
use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;

use crate::db;
use crate::history::timestamp;

/// Installed server software per server (type/version/build)
#[derive(Debug, Clone)]
pub struct ServerVersionStore {
    db_path: PathBuf,
}

impl ServerVersionStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn get(&self, server_id: &str) -> Result<Option<MinecraftVersion>> {
        let conn = db::open(&self.db_path)?;
        let version = conn
            .query_row(
                "SELECT minecraft_type, minecraft_version, minecraft_build
                 FROM server_minecraft_versions WHERE server_id = ?1",
                params![server_id],
                |row| {
                    Ok(MinecraftVersion {
                        minecraft_type: row.get(0)?,
                        minecraft_version: row.get(1)?,
                        minecraft_build: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(version)
    }

    pub fn set(&self, server_id: &str, version: &MinecraftVersion) -> Result<()> {
        let conn = db::open(&self.db_path)?;
        conn.execute(
            r#"
            INSERT INTO server_minecraft_versions
                (server_id, minecraft_type, minecraft_version, minecraft_build, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(server_id) DO UPDATE SET
                minecraft_type = excluded.minecraft_type,
                minecraft_version = excluded.minecraft_version,
                minecraft_build = excluded.minecraft_build,
                updated_at = excluded.updated_at
            "#,
            params![
                server_id,
                version.minecraft_type,
                version.minecraft_version,
                version.minecraft_build,
                timestamp(),
            ],
        )?;
        Ok(())
    }
}
