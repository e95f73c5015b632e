//! Analysis history rows
//!
//! Both job families write here. Detailed analyses are flattened to a summary
//! plus action strings so the history list can show either kind.

use chrono::{DateTime, Utc};
use meetnote_common::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{format_timestamp, parse_timestamp, DEMO_USER_ID};

/// Analysis to persist
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    pub meeting_id: Option<i64>,
    pub raw_notes: String,
    pub summary: String,
    pub actions: Vec<String>,
}

/// Stored analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: i64,
    pub meeting_id: Option<i64>,
    pub user_id: Option<String>,
    pub summary: String,
    pub actions: Vec<String>,
    pub raw_notes: String,
    #[serde(rename = "createdAtUtc")]
    pub created_at: DateTime<Utc>,
}

const SELECT_ANALYSIS: &str = r#"
    SELECT id, meeting_id, user_id, raw_notes, summary, actions_json, created_at
    FROM meeting_analyses
"#;

fn record_from_row(row: SqliteRow) -> Result<AnalysisRecord> {
    let actions_json: String = row.get("actions_json");
    let actions: Vec<String> = serde_json::from_str(&actions_json)
        .map_err(|e| Error::Internal(format!("Failed to deserialize actions: {}", e)))?;
    let created_at: String = row.get("created_at");

    Ok(AnalysisRecord {
        id: row.get("id"),
        meeting_id: row.get("meeting_id"),
        user_id: row.get("user_id"),
        summary: row.get("summary"),
        actions,
        raw_notes: row.get("raw_notes"),
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Insert an analysis; returns its id
pub async fn insert_analysis(pool: &SqlitePool, analysis: &NewAnalysis) -> Result<i64> {
    let actions_json = serde_json::to_string(&analysis.actions)?;

    let id = sqlx::query(
        r#"
        INSERT INTO meeting_analyses (meeting_id, user_id, raw_notes, summary, actions_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(analysis.meeting_id)
    .bind(DEMO_USER_ID)
    .bind(&analysis.raw_notes)
    .bind(&analysis.summary)
    .bind(&actions_json)
    .bind(format_timestamp(Utc::now()))
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Load one analysis by id
pub async fn get_analysis(pool: &SqlitePool, id: i64) -> Result<Option<AnalysisRecord>> {
    let sql = format!("{} WHERE id = ?", SELECT_ANALYSIS);
    sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(record_from_row)
        .transpose()
}

/// Most recently created analysis
pub async fn latest_analysis(pool: &SqlitePool) -> Result<Option<AnalysisRecord>> {
    let sql = format!("{} ORDER BY created_at DESC, id DESC LIMIT 1", SELECT_ANALYSIS);
    sqlx::query(&sql)
        .fetch_optional(pool)
        .await?
        .map(record_from_row)
        .transpose()
}

/// Newest analyses first
pub async fn list_analyses(pool: &SqlitePool, take: u32) -> Result<Vec<AnalysisRecord>> {
    let sql = format!("{} ORDER BY created_at DESC, id DESC LIMIT ?", SELECT_ANALYSIS);
    sqlx::query(&sql)
        .bind(take as i64)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(record_from_row)
        .collect()
}

/// Newest analyses of one meeting first
pub async fn list_for_meeting(
    pool: &SqlitePool,
    meeting_id: i64,
    take: u32,
) -> Result<Vec<AnalysisRecord>> {
    let sql = format!(
        "{} WHERE meeting_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        SELECT_ANALYSIS
    );
    sqlx::query(&sql)
        .bind(meeting_id)
        .bind(take as i64)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(record_from_row)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{meetings::create_meeting, test_pool};

    fn notes(summary: &str, meeting_id: Option<i64>) -> NewAnalysis {
        NewAnalysis {
            meeting_id,
            raw_notes: "raw".to_string(),
            summary: summary.to_string(),
            actions: vec!["First".to_string(), "Second".to_string()],
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_keeps_action_order() {
        let pool = test_pool().await;
        let id = insert_analysis(&pool, &notes("Budget", None)).await.unwrap();

        let record = get_analysis(&pool, id).await.unwrap().unwrap();
        assert_eq!(record.summary, "Budget");
        assert_eq!(record.actions, vec!["First", "Second"]);
        assert_eq!(record.meeting_id, None);
        assert_eq!(record.user_id.as_deref(), Some(DEMO_USER_ID));

        assert!(get_analysis(&pool, id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_and_list_order() {
        let pool = test_pool().await;
        assert!(latest_analysis(&pool).await.unwrap().is_none());

        insert_analysis(&pool, &notes("one", None)).await.unwrap();
        insert_analysis(&pool, &notes("two", None)).await.unwrap();
        let newest = insert_analysis(&pool, &notes("three", None)).await.unwrap();

        assert_eq!(latest_analysis(&pool).await.unwrap().unwrap().id, newest);

        let listed = list_analyses(&pool, 2).await.unwrap();
        let summaries: Vec<&str> = listed.iter().map(|a| a.summary.as_str()).collect();
        assert_eq!(summaries, vec!["three", "two"]);
    }

    #[tokio::test]
    async fn test_list_for_meeting_filters() {
        let pool = test_pool().await;
        let meeting = create_meeting(&pool, None).await.unwrap();
        insert_analysis(&pool, &notes("loose notes", None)).await.unwrap();
        insert_analysis(&pool, &notes("meeting notes", Some(meeting.id)))
            .await
            .unwrap();

        let listed = list_for_meeting(&pool, meeting.id, 25).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].summary, "meeting notes");
    }
}
