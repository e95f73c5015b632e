//! Persistence capability used by the job orchestrator

use async_trait::async_trait;
use meetnote_common::Result;
use sqlx::SqlitePool;

use super::analyses::{self, NewAnalysis};
use super::meetings;
use super::transcripts::{self, NewTranscript};
use crate::services::Transcription;

/// Durable writes performed by jobs
///
/// Append-only from the job's point of view: a job never reads back what it
/// wrote and never retries a failed write.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Persist an analysis; returns its id
    async fn save_analysis(&self, analysis: NewAnalysis) -> Result<i64>;

    /// Store a transcription as the meeting's only transcript; returns its id
    async fn replace_transcript(&self, meeting_id: i64, transcription: &Transcription) -> Result<i64>;

    /// Rename a meeting
    async fn rename_meeting(&self, meeting_id: i64, title: &str) -> Result<()>;
}

/// [`MeetingStore`] backed by the SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MeetingStore for SqliteStore {
    async fn save_analysis(&self, analysis: NewAnalysis) -> Result<i64> {
        analyses::insert_analysis(&self.pool, &analysis).await
    }

    async fn replace_transcript(&self, meeting_id: i64, transcription: &Transcription) -> Result<i64> {
        transcripts::replace_transcript(
            &self.pool,
            meeting_id,
            NewTranscript {
                language: &transcription.language,
                duration_seconds: transcription.duration_seconds,
                text: &transcription.text,
                segments: &transcription.segments,
            },
        )
        .await
    }

    async fn rename_meeting(&self, meeting_id: i64, title: &str) -> Result<()> {
        if !meetings::update_title(&self.pool, meeting_id, title).await? {
            return Err(meetnote_common::Error::NotFound(format!(
                "Meeting {} not found",
                meeting_id
            )));
        }
        Ok(())
    }
}
