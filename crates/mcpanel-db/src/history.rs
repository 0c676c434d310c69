use chrono::{SecondsFormat, Utc};
use mcpanel_core::{HistoryEntry, HistoryRecord, Result};
use rusqlite::{params, Row};
use std::path::PathBuf;

use crate::db;

/// Сколько записей показывать в "недавно установленных"
pub const RECENT_LIMIT: usize = 5;

/// Журнал установок модпаков. Уникальность по (server_id, provider, modpack_id),
/// записи никогда не удаляются этим модулем.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    db_path: PathBuf,
}

impl HistoryLedger {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Вставляет запись или обновляет существующую для той же тройки ключей
    pub fn upsert(&self, entry: &HistoryEntry) -> Result<HistoryRecord> {
        let conn = db::open(&self.db_path)?;
        let now = timestamp();

        conn.execute(
            r#"
            INSERT INTO server_modpack_history
                (server_id, provider, modpack_id, name, version_id, icon_url, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(server_id, provider, modpack_id) DO UPDATE SET
                name = excluded.name,
                version_id = excluded.version_id,
                icon_url = excluded.icon_url,
                updated_at = excluded.updated_at
            "#,
            params![
                entry.server_id,
                entry.provider,
                entry.modpack_id,
                entry.name,
                entry.version_id,
                entry.icon_url,
                now,
            ],
        )?;

        let record = conn.query_row(
            "SELECT id, server_id, provider, modpack_id, name, version_id, icon_url, created_at, updated_at
             FROM server_modpack_history
             WHERE server_id = ?1 AND provider = ?2 AND modpack_id = ?3",
            params![entry.server_id, entry.provider, entry.modpack_id],
            row_to_record,
        )?;

        log::debug!(
            "History upsert: server={} provider={} modpack={} version={}",
            record.server_id,
            record.provider,
            record.modpack_id,
            record.version_id
        );
        Ok(record)
    }

    /// Последние установки на сервере, новые первыми
    pub fn recent(&self, server_id: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        let conn = db::open(&self.db_path)?;
        let mut stmt = conn.prepare(
            "SELECT id, server_id, provider, modpack_id, name, version_id, icon_url, created_at, updated_at
             FROM server_modpack_history
             WHERE server_id = ?1
             ORDER BY updated_at DESC, id DESC
             LIMIT ?2",
        )?;

        let records = stmt
            .query_map(params![server_id, limit as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        id: row.get(0)?,
        server_id: row.get(1)?,
        provider: row.get(2)?,
        modpack_id: row.get(3)?,
        name: row.get(4)?,
        version_id: row.get(5)?,
        icon_url: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
