use rusqlite::Connection;
use std::path::Path;

/// Создаёт файл базы и таблицы аддона, если их ещё нет
pub fn init_db(db_path: impl AsRef<Path>) -> rusqlite::Result<()> {
    let conn = open(db_path)?;
    // WAL сохраняется в файле базы, повторять на каждом соединении не нужно
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        log::warn!("SQLite stayed in {} journal mode", mode);
    }
    conn.execute_batch(
        r#"
        -- История установок модпаков (одна строка на сервер/платформу/модпак)
        CREATE TABLE IF NOT EXISTS server_modpack_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id TEXT NOT NULL,
            provider TEXT NOT NULL,             -- curseforge/feedthebeast/modrinth
            modpack_id TEXT NOT NULL,
            name TEXT NOT NULL,
            version_id TEXT NOT NULL,
            icon_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (server_id, provider, modpack_id)
        );

        CREATE INDEX IF NOT EXISTS idx_modpack_history_server
            ON server_modpack_history(server_id, updated_at);

        -- Установленное ядро сервера (тип/версия/сборка)
        CREATE TABLE IF NOT EXISTS server_minecraft_versions (
            server_id TEXT PRIMARY KEY,
            minecraft_type TEXT NOT NULL,
            minecraft_version TEXT NOT NULL,
            minecraft_build TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    log::info!("Database initialized at {}", db_path_display(&conn));
    Ok(())
}

/// Открывает соединение с включёнными foreign keys
pub fn open(db_path: impl AsRef<Path>) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}

fn db_path_display(conn: &Connection) -> String {
    conn.path().unwrap_or("<memory>").to_string()
}
