//! Transcripts and their timed segments
//!
//! A meeting has at most one transcript. Uploading new audio replaces the
//! previous transcript and all of its segments in one transaction.

use chrono::{DateTime, Utc};
use meetnote_common::events::TranscriptSegment;
use meetnote_common::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use super::{format_timestamp, parse_timestamp};

/// Stored transcript with segments ordered by index
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTranscript {
    #[serde(rename = "transcriptId")]
    pub id: i64,
    pub meeting_id: i64,
    pub language: String,
    pub duration_seconds: f64,
    pub text: String,
    #[serde(rename = "createdAtUtc")]
    pub created_at: DateTime<Utc>,
    pub segments: Vec<TranscriptSegment>,
}

/// Transcript fields written on upload
#[derive(Debug, Clone, Copy)]
pub struct NewTranscript<'a> {
    pub language: &'a str,
    pub duration_seconds: f64,
    pub text: &'a str,
    pub segments: &'a [TranscriptSegment],
}

/// Replace the meeting's transcript; returns the new transcript id
pub async fn replace_transcript(
    pool: &SqlitePool,
    meeting_id: i64,
    transcript: NewTranscript<'_>,
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM transcript_segments WHERE transcript_id IN (SELECT id FROM transcripts WHERE meeting_id = ?)",
    )
    .bind(meeting_id)
    .execute(&mut *tx)
    .await?;

    let replaced = sqlx::query("DELETE FROM transcripts WHERE meeting_id = ?")
        .bind(meeting_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let transcript_id = sqlx::query(
        r#"
        INSERT INTO transcripts (meeting_id, language, duration_seconds, text, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(meeting_id)
    .bind(transcript.language)
    .bind(transcript.duration_seconds)
    .bind(transcript.text)
    .bind(format_timestamp(Utc::now()))
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for segment in transcript.segments {
        sqlx::query(
            r#"
            INSERT INTO transcript_segments (transcript_id, segment_index, start_seconds, end_seconds, text)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(transcript_id)
        .bind(segment.index as i64)
        .bind(segment.start_seconds)
        .bind(segment.end_seconds)
        .bind(&segment.text)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        meeting_id,
        transcript_id,
        replaced = replaced > 0,
        segments = transcript.segments.len(),
        "Transcript stored"
    );
    Ok(transcript_id)
}

/// Load a meeting's transcript with its segments
pub async fn get_transcript(pool: &SqlitePool, meeting_id: i64) -> Result<Option<StoredTranscript>> {
    let row = sqlx::query(
        r#"
        SELECT id, meeting_id, language, duration_seconds, text, created_at
        FROM transcripts
        WHERE meeting_id = ?
        "#,
    )
    .bind(meeting_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: i64 = row.get("id");
    let created_at: String = row.get("created_at");

    let segments = sqlx::query(
        r#"
        SELECT segment_index, start_seconds, end_seconds, text
        FROM transcript_segments
        WHERE transcript_id = ?
        ORDER BY segment_index ASC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|s| TranscriptSegment {
        index: s.get::<i64, _>("segment_index") as u32,
        start_seconds: s.get("start_seconds"),
        end_seconds: s.get("end_seconds"),
        text: s.get("text"),
    })
    .collect();

    Ok(Some(StoredTranscript {
        id,
        meeting_id: row.get("meeting_id"),
        language: row.get("language"),
        duration_seconds: row.get("duration_seconds"),
        text: row.get("text"),
        created_at: parse_timestamp(&created_at)?,
        segments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{meetings::create_meeting, test_pool};

    fn segment(index: u32, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            index,
            start_seconds: index as f64,
            end_seconds: index as f64 + 1.0,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_segments_come_back_ordered_by_index() {
        let pool = test_pool().await;
        let meeting = create_meeting(&pool, None).await.unwrap();
        let segments = vec![segment(2, "c"), segment(0, "a"), segment(1, "b")];

        replace_transcript(
            &pool,
            meeting.id,
            NewTranscript {
                language: "en",
                duration_seconds: 3.0,
                text: "a b c",
                segments: &segments,
            },
        )
        .await
        .unwrap();

        let stored = get_transcript(&pool, meeting.id).await.unwrap().unwrap();
        let order: Vec<&str> = stored.segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(stored.language, "en");
    }

    #[tokio::test]
    async fn test_replace_drops_previous_transcript_and_segments() {
        let pool = test_pool().await;
        let meeting = create_meeting(&pool, None).await.unwrap();

        let first = replace_transcript(
            &pool,
            meeting.id,
            NewTranscript {
                language: "sv",
                duration_seconds: 10.0,
                text: "old",
                segments: &[segment(0, "old")],
            },
        )
        .await
        .unwrap();

        let second = replace_transcript(
            &pool,
            meeting.id,
            NewTranscript {
                language: "en",
                duration_seconds: 5.0,
                text: "new",
                segments: &[],
            },
        )
        .await
        .unwrap();
        assert_ne!(first, second);

        let stored = get_transcript(&pool, meeting.id).await.unwrap().unwrap();
        assert_eq!(stored.id, second);
        assert_eq!(stored.text, "new");
        assert!(stored.segments.is_empty());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transcript_segments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_missing_transcript_is_none() {
        let pool = test_pool().await;
        let meeting = create_meeting(&pool, None).await.unwrap();
        assert!(get_transcript(&pool, meeting.id).await.unwrap().is_none());
    }
}
