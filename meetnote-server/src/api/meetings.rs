//! Meetings, audio upload, transcripts and meeting analysis jobs

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use meetnote_common::events::TranscriptSegment;
use serde::{Deserialize, Serialize};

use super::analysis::TakeQuery;
use crate::db::meetings::{self, Meeting, MeetingListItem};
use crate::db::transcripts::{self, StoredTranscript};
use crate::db::analyses;
use crate::error::{ApiError, ApiResult};
use crate::orchestrator::{
    run_detached, AudioIngest, DetailedJobRequest, DetailedJobResult, SimpleJobResult,
};
use crate::services::AudioUpload;
use crate::AppState;

/// Largest accepted audio upload
pub const MAX_AUDIO_BYTES: usize = 50_000_000;

const DEFAULT_MEETING_TAKE: u32 = 25;
const MEETING_ANALYSES_SHOWN: u32 = 25;

/// POST /api/meetings request
#[derive(Debug, Default, Deserialize)]
pub struct CreateMeetingRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// Transcript as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub meeting_id: i64,
    pub transcript_id: i64,
    pub language: String,
    pub duration_seconds: f64,
    pub segment_count: usize,
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl From<StoredTranscript> for TranscriptResponse {
    fn from(t: StoredTranscript) -> Self {
        Self {
            meeting_id: t.meeting_id,
            transcript_id: t.id,
            language: t.language,
            duration_seconds: t.duration_seconds,
            segment_count: t.segments.len(),
            text: t.text,
            segments: t.segments,
        }
    }
}

/// Analysis row on the meeting details page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingAnalysisSummary {
    pub id: i64,
    pub summary: String,
    pub created_at_utc: DateTime<Utc>,
}

/// GET /api/meetings/:id response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetails {
    pub id: i64,
    pub title: String,
    pub created_at_utc: DateTime<Utc>,
    pub transcript: Option<TranscriptResponse>,
    pub analyses: Vec<MeetingAnalysisSummary>,
}

async fn load_meeting(state: &AppState, id: i64) -> ApiResult<Meeting> {
    meetings::get_meeting(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Meeting not found.".to_string()))
}

/// POST /api/meetings
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateMeetingRequest>,
) -> ApiResult<Json<Meeting>> {
    let meeting = meetings::create_meeting(&state.db, request.title.as_deref()).await?;
    Ok(Json(meeting))
}

/// GET /api/meetings?take=25
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<TakeQuery>,
) -> ApiResult<Json<Vec<MeetingListItem>>> {
    let items = meetings::list_meetings(&state.db, query.resolve(DEFAULT_MEETING_TAKE)).await?;
    Ok(Json(items))
}

/// GET /api/meetings/:id
pub async fn details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingDetails>> {
    let meeting = load_meeting(&state, id).await?;
    let transcript = transcripts::get_transcript(&state.db, id).await?;
    let analyses = analyses::list_for_meeting(&state.db, id, MEETING_ANALYSES_SHOWN)
        .await?
        .into_iter()
        .map(|a| MeetingAnalysisSummary {
            id: a.id,
            summary: a.summary,
            created_at_utc: a.created_at,
        })
        .collect();

    Ok(Json(MeetingDetails {
        id: meeting.id,
        title: meeting.title,
        created_at_utc: meeting.created_at,
        transcript: transcript.map(TranscriptResponse::from),
        analyses,
    }))
}

/// POST /api/meetings/:id/audio (multipart, field `file`)
///
/// Transcribes the upload and replaces the meeting's transcript.
pub async fn upload_audio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Json<AudioIngest>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("audio").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read file: {}", e)))?;
        upload = Some(AudioUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("file is required.".to_string()))?;
    if upload.bytes.is_empty() {
        return Err(ApiError::BadRequest("file is empty.".to_string()));
    }

    let meeting = load_meeting(&state, id).await?;
    let ingest = state.orchestrator.ingest_audio(&meeting, upload).await?;
    Ok(Json(ingest))
}

/// GET /api/meetings/:id/transcript
pub async fn transcript(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TranscriptResponse>> {
    load_meeting(&state, id).await?;
    transcripts::get_transcript(&state.db, id)
        .await?
        .map(|t| Json(TranscriptResponse::from(t)))
        .ok_or_else(|| ApiError::NotFound("No transcript for this meeting.".to_string()))
}

/// POST /api/meetings/:id/analyze
///
/// Simple analysis job over the stored transcript.
pub async fn analyze(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SimpleJobResult>> {
    load_meeting(&state, id).await?;
    let transcript = transcripts::get_transcript(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No transcript uploaded for this meeting.".to_string()))?;

    let orchestrator = state.orchestrator.clone();
    let result = run_detached(move |cancel| async move {
        orchestrator
            .start_meeting_analysis_job(id, &transcript.text, cancel)
            .await
    })
    .await?;

    Ok(Json(result))
}

/// POST /api/meetings/:id/analyze-transcript
///
/// Detailed analysis job; a provider failure is reported as 502.
pub async fn analyze_transcript(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DetailedJobResult>> {
    let meeting = load_meeting(&state, id).await?;
    let transcript = transcripts::get_transcript(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No transcript for this meeting yet.".to_string()))?;

    let request = DetailedJobRequest {
        meeting_id: Some(meeting.id),
        meeting_title: meeting.title,
        transcript_text: transcript.text,
        segments: transcript.segments,
    };

    let orchestrator = state.orchestrator.clone();
    let result = run_detached(move |cancel| async move {
        orchestrator.start_detailed_analysis_job(request, cancel).await
    })
    .await?;

    Ok(Json(result))
}

/// Build meeting routes
pub fn meeting_routes() -> Router<AppState> {
    Router::new()
        .route("/api/meetings", post(create).get(list))
        .route("/api/meetings/:id", get(details))
        .route(
            "/api/meetings/:id/audio",
            post(upload_audio).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route("/api/meetings/:id/transcript", get(transcript))
        .route("/api/meetings/:id/analyze", post(analyze))
        .route("/api/meetings/:id/analyze-transcript", post(analyze_transcript))
}
