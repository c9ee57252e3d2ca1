// ABOUTME: Table definitions for the podshelf database file and the schema-version guard.
// ABOUTME: Also hosts the column decoding helpers shared by the record and library queries.

use chrono::{DateTime, Utc};
use podshelf_core::timestamp;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, TransactionBehavior};

use crate::error::StoreError;

/// Value written to `PRAGMA user_version` once the tables below exist.
pub(crate) const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS feeds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        image_url TEXT,
        added_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS episodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        feed_id INTEGER NOT NULL,
        guid TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        audio_url TEXT NOT NULL,
        pub_date TEXT,
        duration TEXT,
        played INTEGER NOT NULL DEFAULT 0,
        position REAL NOT NULL DEFAULT 0,
        FOREIGN KEY (feed_id) REFERENCES feeds(id) ON DELETE CASCADE,
        UNIQUE(feed_id, audio_url)
    );

    CREATE INDEX IF NOT EXISTS idx_episodes_feed ON episodes(feed_id);
";

/// Create the tables if absent and stamp the schema version.
///
/// Runs inside an IMMEDIATE transaction, so a read-only file fails here
/// rather than on the first client write.
pub(crate) fn initialize(conn: &mut Connection) -> Result<(), StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let version: i64 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(StoreError::Unavailable(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    tx.execute_batch(SCHEMA)?;
    if version < SCHEMA_VERSION {
        tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        tracing::info!(version = SCHEMA_VERSION, "database schema created");
    }
    tx.commit()?;
    Ok(())
}

/// Read a timestamp column written with [`timestamp::to_db`].
pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    timestamp::from_db(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
