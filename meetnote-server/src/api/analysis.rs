//! Notes analysis and analysis history
//!
//! POST /api/analysis/analyze, GET /api/analysis/latest, GET /api/analysis,
//! GET /api/analysis/:id

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use meetnote_common::text::preview;
use serde::{Deserialize, Serialize};

use crate::db::analyses::{self, AnalysisRecord};
use crate::error::{ApiError, ApiResult};
use crate::orchestrator::{run_detached, SimpleJobResult};
use crate::AppState;

/// Characters of summary shown in the history list
pub const SUMMARY_PREVIEW_CHARS: usize = 140;

const DEFAULT_HISTORY_TAKE: u32 = 10;
const MAX_TAKE: u32 = 200;

/// POST /api/analysis/analyze request
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: String,
}

/// `take` query parameter
#[derive(Debug, Deserialize)]
pub struct TakeQuery {
    pub take: Option<u32>,
}

impl TakeQuery {
    /// Requested count clamped to 1..=200
    pub fn resolve(&self, default: u32) -> u32 {
        self.take.unwrap_or(default).clamp(1, MAX_TAKE)
    }
}

/// History list row
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisListItem {
    pub id: i64,
    pub summary_preview: String,
    pub created_at_utc: DateTime<Utc>,
}

impl From<AnalysisRecord> for AnalysisListItem {
    fn from(record: AnalysisRecord) -> Self {
        Self {
            id: record.id,
            summary_preview: preview(&record.summary, SUMMARY_PREVIEW_CHARS),
            created_at_utc: record.created_at,
        }
    }
}

/// POST /api/analysis/analyze
///
/// Runs a simple analysis job. Progress and the result are broadcast on the
/// meeting hub; the result is also returned here. Blank text is rejected
/// with 400 before any event is sent.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<SimpleJobResult>> {
    let orchestrator = state.orchestrator.clone();
    let result = run_detached(move |cancel| async move {
        orchestrator
            .start_simple_analysis_job(&request.text, cancel)
            .await
    })
    .await?;

    Ok(Json(result))
}

/// GET /api/analysis/latest
pub async fn latest(State(state): State<AppState>) -> ApiResult<Json<AnalysisRecord>> {
    analyses::latest_analysis(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No analyses yet".to_string()))
}

/// GET /api/analysis?take=10
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<TakeQuery>,
) -> ApiResult<Json<Vec<AnalysisListItem>>> {
    let records = analyses::list_analyses(&state.db, query.resolve(DEFAULT_HISTORY_TAKE)).await?;
    Ok(Json(records.into_iter().map(AnalysisListItem::from).collect()))
}

/// GET /api/analysis/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<AnalysisRecord>> {
    analyses::get_analysis(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", id)))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analysis/analyze", post(analyze))
        .route("/api/analysis/latest", get(latest))
        .route("/api/analysis", get(list))
        .route("/api/analysis/:id", get(get_by_id))
}
