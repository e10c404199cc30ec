use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Create the three report tables if they don't exist yet. The schema is
/// fixed; there is no versioned migration machinery.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS missing_summary (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp       TEXT NOT NULL,
            total_missing   INTEGER NOT NULL,
            comment         TEXT,
            user_id         INTEGER NOT NULL REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS missing_dishes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            dish_id     INTEGER NOT NULL,
            date        TEXT NOT NULL,
            dining_hall TEXT NOT NULL,
            meal        TEXT NOT NULL,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            summary_id  INTEGER NOT NULL REFERENCES missing_summary(id)
        );

        CREATE INDEX IF NOT EXISTS idx_missing_dishes_summary
            ON missing_dishes(summary_id);
        ",
    )?;

    info!("Database schema ready");
    Ok(())
}
