//! Meeting rows

use chrono::{DateTime, Utc};
use meetnote_common::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use super::{format_timestamp, parse_timestamp, DEMO_USER_ID};

/// Title given to meetings created without one
pub const DEFAULT_MEETING_TITLE: &str = "New meeting";

/// Meeting row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: i64,
    #[serde(skip)]
    pub user_id: String,
    pub title: String,
    #[serde(rename = "createdAtUtc")]
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    /// Whether the title was never set by the user
    pub fn has_default_title(&self) -> bool {
        let title = self.title.trim();
        title.is_empty() || title.eq_ignore_ascii_case(DEFAULT_MEETING_TITLE)
    }
}

/// Row of the meeting history list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingListItem {
    pub id: i64,
    pub title: String,
    #[serde(rename = "createdAtUtc")]
    pub created_at: DateTime<Utc>,
    pub has_transcript: bool,
    pub last_analysis_at_utc: Option<DateTime<Utc>>,
}

/// Insert a meeting; a blank title becomes [`DEFAULT_MEETING_TITLE`]
pub async fn create_meeting(pool: &SqlitePool, title: Option<&str>) -> Result<Meeting> {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_MEETING_TITLE)
        .to_string();
    let created_at = Utc::now();

    let id = sqlx::query("INSERT INTO meetings (user_id, title, created_at) VALUES (?, ?, ?)")
        .bind(DEMO_USER_ID)
        .bind(&title)
        .bind(format_timestamp(created_at))
        .execute(pool)
        .await?
        .last_insert_rowid();

    tracing::debug!(meeting_id = id, title = %title, "Meeting created");

    Ok(Meeting {
        id,
        user_id: DEMO_USER_ID.to_string(),
        title,
        created_at,
    })
}

/// Load a meeting by id
pub async fn get_meeting(pool: &SqlitePool, id: i64) -> Result<Option<Meeting>> {
    let row = sqlx::query("SELECT id, user_id, title, created_at FROM meetings WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let created_at: String = row.get("created_at");
            Ok(Some(Meeting {
                id: row.get("id"),
                user_id: row.get("user_id"),
                title: row.get("title"),
                created_at: parse_timestamp(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Change a meeting title; returns false if the meeting does not exist
pub async fn update_title(pool: &SqlitePool, id: i64, title: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE meetings SET title = ? WHERE id = ?")
        .bind(title)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Newest meetings first, with transcript presence and latest analysis time
pub async fn list_meetings(pool: &SqlitePool, take: u32) -> Result<Vec<MeetingListItem>> {
    let rows = sqlx::query(
        r#"
        SELECT m.id, m.title, m.created_at,
               EXISTS (SELECT 1 FROM transcripts t WHERE t.meeting_id = m.id) AS has_transcript,
               (SELECT MAX(a.created_at) FROM meeting_analyses a WHERE a.meeting_id = m.id) AS last_analysis_at
        FROM meetings m
        ORDER BY m.created_at DESC, m.id DESC
        LIMIT ?
        "#,
    )
    .bind(take as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let created_at: String = row.get("created_at");
            let last_analysis_at: Option<String> = row.get("last_analysis_at");
            Ok(MeetingListItem {
                id: row.get("id"),
                title: row.get("title"),
                created_at: parse_timestamp(&created_at)?,
                has_transcript: row.get::<i64, _>("has_transcript") != 0,
                last_analysis_at_utc: last_analysis_at
                    .as_deref()
                    .map(parse_timestamp)
                    .transpose()?,
            })
        })
        .collect()
}
