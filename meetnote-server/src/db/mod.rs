//! SQLite persistence for meetings, transcripts and analyses
//!
//! The database file lives in the root folder (`meetnote.db`). Timestamps
//! are stored as RFC 3339 strings with fixed microsecond precision so they
//! sort lexically.

pub mod analyses;
pub mod meetings;
pub mod store;
pub mod transcripts;

pub use store::{MeetingStore, SqliteStore};

use chrono::{DateTime, SecondsFormat, Utc};
use meetnote_common::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

/// User recorded on every row until authentication exists
pub const DEMO_USER_ID: &str = "demo-user";

/// Open (creating if needed) the database and ensure the schema exists
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::debug!("Connecting to database: {}", db_path.display());

    // Foreign keys are a per-connection setting, applied to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcripts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meeting_id INTEGER NOT NULL UNIQUE REFERENCES meetings(id) ON DELETE CASCADE,
            language TEXT NOT NULL DEFAULT 'unknown',
            duration_seconds REAL NOT NULL DEFAULT 0,
            text TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcript_segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transcript_id INTEGER NOT NULL REFERENCES transcripts(id) ON DELETE CASCADE,
            segment_index INTEGER NOT NULL,
            start_seconds REAL NOT NULL,
            end_seconds REAL NOT NULL,
            text TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meeting_analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meeting_id INTEGER REFERENCES meetings(id) ON DELETE SET NULL,
            user_id TEXT,
            raw_notes TEXT NOT NULL,
            summary TEXT NOT NULL,
            actions_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_segments_transcript ON transcript_segments(transcript_id, segment_index)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analyses_created ON meeting_analyses(created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analyses_meeting ON meeting_analyses(meeting_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Format a timestamp for storage
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_tables(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_tables_is_idempotent() {
        let pool = test_pool().await;
        init_tables(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('meetings', 'transcripts', 'transcript_segments', 'meeting_analyses')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_init_database_pool_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("data").join("meetnote.db");

        let pool = init_database_pool(&db_path).await.unwrap();
        assert!(db_path.exists());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_every_pooled_connection_enforces_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database_pool(&dir.path().join("meetnote.db")).await.unwrap();

        // Hold several connections at once so more than one is opened
        let mut held = Vec::new();
        for _ in 0..3 {
            let mut conn = pool.acquire().await.unwrap();
            let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
                .fetch_one(&mut *conn)
                .await
                .unwrap();
            assert_eq!(enabled, 1);
            held.push(conn);
        }
        drop(held);

        let orphan = sqlx::query(
            "INSERT INTO transcripts (meeting_id, text, created_at) VALUES (4242, 'x', '2026-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await;
        assert!(orphan.is_err());
        pool.close().await;
    }

    #[test]
    fn test_timestamp_round_trip_keeps_micros() {
        let now = Utc::now();
        let stored = format_timestamp(now);
        assert!(stored.ends_with('Z'));
        let parsed = parse_timestamp(&stored).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
