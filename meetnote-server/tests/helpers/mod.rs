//! Test helper utilities
//!
//! In-process fakes for the orchestrator's capabilities, an in-memory
//! database, and small event helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use meetnote_common::events::{
    ActionItem, AnalysisSummary, DetailedAnalysis, TranscriptSegment,
};
use meetnote_common::HubEvent;
use meetnote_server::db::analyses::NewAnalysis;
use meetnote_server::db::MeetingStore;
use meetnote_server::hub::{BroadcastHub, ConnectionHandle};
use meetnote_server::orchestrator::{JobOrchestrator, OrchestratorConfig};
use meetnote_server::services::{
    AnalysisProvider, AudioUpload, ProviderError, Transcriber, Transcription,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Notes used by the end-to-end scenarios
pub const NOTES: &str = "Discuss Q1 budget. Decide hiring plan.";

/// Title the fake provider generates
pub const GENERATED_TITLE: &str = "Q1 Budget Review";

pub fn canned_summary() -> AnalysisSummary {
    AnalysisSummary {
        summary: "The team reviewed the Q1 budget and settled the hiring plan.".to_string(),
        actions: vec![
            "Circulate the Q1 budget draft".to_string(),
            "Publish the hiring plan".to_string(),
        ],
    }
}

pub fn canned_detailed() -> DetailedAnalysis {
    DetailedAnalysis {
        title: "Q1 planning".to_string(),
        executive_summary: "Budget reviewed, hiring plan agreed.".to_string(),
        key_points: vec!["Budget is on track".to_string()],
        decisions: vec!["Hire two engineers".to_string()],
        action_items: vec![
            ActionItem {
                task: "Open job postings".to_string(),
                owner: Some("Maria".to_string()),
                due_date: Some("2026-11-01".to_string()),
                context: None,
            },
            ActionItem {
                task: "Update forecast".to_string(),
                owner: None,
                due_date: None,
                context: None,
            },
        ],
        risks: vec!["Hiring may slip".to_string()],
        open_questions: vec!["Remote or on-site?".to_string()],
    }
}

/// Analysis provider with scripted behavior
#[derive(Default)]
pub struct FakeAnalysis {
    fail: bool,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
}

impl FakeAnalysis {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Succeeds, but each call waits until `gate` is notified
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn call(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(ProviderError::ApiError(500, "upstream exploded".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisProvider for FakeAnalysis {
    fn provider_id(&self) -> &'static str {
        "fake"
    }

    async fn analyze(&self, _text: &str) -> Result<AnalysisSummary, ProviderError> {
        self.call().await?;
        Ok(canned_summary())
    }

    async fn analyze_detailed(
        &self,
        _meeting_title: &str,
        _full_text: &str,
        _segments: &[TranscriptSegment],
    ) -> Result<DetailedAnalysis, ProviderError> {
        self.call().await?;
        Ok(canned_detailed())
    }

    async fn generate_title(&self, _text: &str) -> Result<String, ProviderError> {
        self.call().await?;
        Ok(GENERATED_TITLE.to_string())
    }
}

/// Transcriber returning a fixed two-segment transcript
#[derive(Default)]
pub struct FakeTranscriber {
    pub fail: bool,
}

pub fn canned_transcription() -> Transcription {
    Transcription {
        text: "Welcome everyone. Let's discuss the Q1 budget.".to_string(),
        language: "en".to_string(),
        duration_seconds: 12.5,
        segments: vec![
            TranscriptSegment {
                index: 0,
                start_seconds: 0.0,
                end_seconds: 4.0,
                text: "Welcome everyone.".to_string(),
            },
            TranscriptSegment {
                index: 1,
                start_seconds: 4.0,
                end_seconds: 12.5,
                text: "Let's discuss the Q1 budget.".to_string(),
            },
        ],
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    fn provider_id(&self) -> &'static str {
        "fake"
    }

    async fn transcribe(&self, _audio: AudioUpload) -> Result<Transcription, ProviderError> {
        if self.fail {
            return Err(ProviderError::NetworkError("connection reset".to_string()));
        }
        Ok(canned_transcription())
    }
}

/// Store keeping analyses in memory, optionally rejecting every write
#[derive(Default)]
pub struct MemoryStore {
    pub analyses: Mutex<Vec<NewAnalysis>>,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<NewAnalysis> {
        self.analyses.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeetingStore for MemoryStore {
    async fn save_analysis(&self, analysis: NewAnalysis) -> meetnote_common::Result<i64> {
        if self.fail_writes {
            return Err(meetnote_common::Error::Internal("disk full".to_string()));
        }
        let mut analyses = self.analyses.lock().unwrap();
        analyses.push(analysis);
        Ok(analyses.len() as i64)
    }

    async fn replace_transcript(
        &self,
        _meeting_id: i64,
        _transcription: &Transcription,
    ) -> meetnote_common::Result<i64> {
        if self.fail_writes {
            return Err(meetnote_common::Error::Internal("disk full".to_string()));
        }
        Ok(1)
    }

    async fn rename_meeting(&self, _meeting_id: i64, _title: &str) -> meetnote_common::Result<()> {
        Ok(())
    }
}

/// Orchestrator without phase pacing
pub fn orchestrator(
    hub: &BroadcastHub,
    analysis: Arc<dyn AnalysisProvider>,
    store: Arc<dyn MeetingStore>,
) -> JobOrchestrator {
    orchestrator_with_delay(hub, analysis, store, Duration::ZERO)
}

pub fn orchestrator_with_delay(
    hub: &BroadcastHub,
    analysis: Arc<dyn AnalysisProvider>,
    store: Arc<dyn MeetingStore>,
    phase_delay: Duration,
) -> JobOrchestrator {
    JobOrchestrator::new(
        hub.clone(),
        analysis,
        Arc::new(FakeTranscriber::default()),
        store,
        OrchestratorConfig { phase_delay },
    )
}

/// Single-connection in-memory database with the schema applied
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    meetnote_server::db::init_tables(&pool).await.unwrap();
    pool
}

/// Everything currently queued on a connection
pub fn drain(handle: &mut ConnectionHandle) -> Vec<HubEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.try_recv() {
        events.push(event);
    }
    events
}

/// Wait (bounded) for the next event on a connection
pub async fn next_event(handle: &mut ConnectionHandle) -> HubEvent {
    tokio::time::timeout(Duration::from_secs(2), handle.recv())
        .await
        .expect("timed out waiting for event")
        .expect("connection closed")
}

/// Phases of the progress events, in order received
pub fn phases(events: &[HubEvent]) -> Vec<meetnote_common::JobPhase> {
    events
        .iter()
        .filter_map(|e| match e {
            HubEvent::Progress { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect()
}
