//! Audio upload: transcription, transcript storage, automatic title

use meetnote_common::text::{preview, take_chars};
use serde::Serialize;

use super::{describe_provider_error, JobError, JobOrchestrator};
use crate::db::meetings::Meeting;
use crate::services::AudioUpload;

/// Characters of transcript sent for title generation
pub const TITLE_INPUT_CHARS: usize = 2000;

/// Characters of transcript echoed back after upload
pub const TRANSCRIPT_PREVIEW_CHARS: usize = 220;

/// Outcome of an audio upload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioIngest {
    pub meeting_id: i64,
    /// Meeting title after a possible automatic rename
    pub title: String,
    pub transcript_id: i64,
    pub language: String,
    pub duration_seconds: f64,
    pub segment_count: usize,
    pub transcript_preview: String,
}

impl JobOrchestrator {
    /// Transcribe uploaded audio and store it as the meeting's transcript
    ///
    /// Replaces any earlier transcript. When the meeting still has its
    /// default title, a title is generated from the start of the transcript;
    /// failure to do so is logged and otherwise ignored.
    pub async fn ingest_audio(
        &self,
        meeting: &Meeting,
        audio: AudioUpload,
    ) -> Result<AudioIngest, JobError> {
        if audio.bytes.is_empty() {
            return Err(JobError::Validation("file is empty.".to_string()));
        }

        tracing::info!(
            meeting_id = meeting.id,
            file_name = %audio.file_name,
            size_bytes = audio.bytes.len(),
            "Transcribing uploaded audio"
        );

        let transcription = self.transcriber.transcribe(audio).await.map_err(|e| {
            tracing::warn!(
                meeting_id = meeting.id,
                transcriber = self.transcriber.provider_id(),
                error = %e,
                "Transcription failed"
            );
            JobError::JobFailed(describe_provider_error(&e))
        })?;

        let transcript_id = self
            .store
            .replace_transcript(meeting.id, &transcription)
            .await
            .map_err(|e| {
                tracing::error!(meeting_id = meeting.id, error = %e, "Failed to store transcript");
                JobError::Persistence("Could not save transcript".to_string())
            })?;

        let mut title = meeting.title.clone();
        if meeting.has_default_title() && !transcription.text.trim().is_empty() {
            if let Some(generated) = self.generate_title(meeting.id, &transcription.text).await {
                title = generated;
            }
        }

        Ok(AudioIngest {
            meeting_id: meeting.id,
            title,
            transcript_id,
            language: transcription.language,
            duration_seconds: transcription.duration_seconds,
            segment_count: transcription.segments.len(),
            transcript_preview: preview(&transcription.text, TRANSCRIPT_PREVIEW_CHARS),
        })
    }

    /// Generate and store a meeting title; `None` on any failure
    async fn generate_title(&self, meeting_id: i64, text: &str) -> Option<String> {
        let input = take_chars(text, TITLE_INPUT_CHARS);

        let generated = match self.analysis.generate_title(input).await {
            Ok(title) => title.trim().to_string(),
            Err(e) => {
                tracing::warn!(meeting_id, error = %e, "Auto-title generation failed");
                return None;
            }
        };
        if generated.is_empty() {
            return None;
        }

        match self.store.rename_meeting(meeting_id, &generated).await {
            Ok(()) => {
                tracing::info!(meeting_id, title = %generated, "Meeting renamed from transcript");
                Some(generated)
            }
            Err(e) => {
                tracing::warn!(meeting_id, error = %e, "Failed to store generated title");
                None
            }
        }
    }
}
