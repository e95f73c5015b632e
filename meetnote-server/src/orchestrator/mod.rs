//! Job orchestrator: drives analysis jobs and reports their progress
//!
//! A job announces each of its phases on the [`BroadcastHub`], waiting for
//! every broadcast to finish before starting the next phase, then makes the
//! one long external call, persists the outcome, and broadcasts a single
//! result event. The same result is returned to the caller.
//!
//! Jobs hold no shared mutable state; the hub's connection set is the only
//! thing they share.

mod fallback;
mod job;
mod transcription;

pub use fallback::{fallback_analysis, FALLBACK_ACTIONS};
pub use job::{JobKind, JobRun, JobState, StateTransition};
pub use transcription::{AudioIngest, TITLE_INPUT_CHARS, TRANSCRIPT_PREVIEW_CHARS};

use crate::db::analyses::NewAnalysis;
use crate::db::MeetingStore;
use crate::hub::BroadcastHub;
use crate::services::{AnalysisProvider, ProviderError, Transcriber};
use meetnote_common::events::{DetailedAnalysis, JobOutput, TranscriptSegment};
use meetnote_common::{HubEvent, JobPhase};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default pause between progress phases
pub const DEFAULT_PHASE_DELAY: Duration = Duration::from_millis(300);

/// Phases of a simple analysis
pub const SIMPLE_PHASES: [JobPhase; 3] =
    [JobPhase::ExtractTopics, JobPhase::Decisions, JobPhase::Actions];

/// Phases of a simple analysis over a stored transcript
pub const MEETING_PHASES: [JobPhase; 4] = [
    JobPhase::Transcript,
    JobPhase::ExtractTopics,
    JobPhase::Decisions,
    JobPhase::Actions,
];

/// Phases of a detailed transcript analysis
pub const DETAILED_PHASES: [JobPhase; 5] = [
    JobPhase::ExtractTopics,
    JobPhase::KeyPoints,
    JobPhase::Decisions,
    JobPhase::Actions,
    JobPhase::Risks,
];

/// Job errors as seen by the caller
#[derive(Debug, Error)]
pub enum JobError {
    /// Input rejected before the job started; no events were sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// The external capability failed and the job cannot degrade
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// The store rejected a write
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// The caller went away before the job finished
    #[error("Job cancelled")]
    Cancelled,

    /// The job task itself died
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Orchestrator tuning
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Pause between consecutive progress phases
    pub phase_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            phase_delay: DEFAULT_PHASE_DELAY,
        }
    }
}

/// Result of a simple analysis job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleJobResult {
    /// Persisted analysis id
    pub id: i64,
    pub summary: String,
    pub actions: Vec<String>,
}

impl SimpleJobResult {
    pub fn to_output(&self) -> JobOutput {
        JobOutput::Simple {
            analysis_id: self.id,
            summary: self.summary.clone(),
            actions: self.actions.clone(),
        }
    }
}

/// Input of a detailed analysis job
#[derive(Debug, Clone)]
pub struct DetailedJobRequest {
    /// Meeting the analysis is filed under, if any
    pub meeting_id: Option<i64>,
    pub meeting_title: String,
    pub transcript_text: String,
    /// Ordered by index
    pub segments: Vec<TranscriptSegment>,
}

/// Result of a detailed analysis job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedJobResult {
    pub analysis_id: i64,
    pub meeting_id: Option<i64>,
    pub detailed: DetailedAnalysis,
}

impl DetailedJobResult {
    pub fn to_output(&self) -> JobOutput {
        JobOutput::Detailed {
            analysis_id: self.analysis_id,
            meeting_id: self.meeting_id,
            detailed: self.detailed.clone(),
        }
    }
}

/// Caller-facing description of a capability failure
///
/// Status codes are kept, response bodies and transport detail are not.
pub fn describe_provider_error(error: &ProviderError) -> String {
    match error {
        ProviderError::NotConfigured(_) => "AI provider is not configured".to_string(),
        ProviderError::NetworkError(_) => "AI provider could not be reached".to_string(),
        ProviderError::ApiError(status, _) => format!("AI provider returned status {}", status),
        ProviderError::ParseError(_) | ProviderError::EmptyResponse => {
            "AI provider returned an unusable response".to_string()
        }
    }
}

/// Run a job on its own task, cancelling it if the returned future is dropped
///
/// An HTTP handler awaiting this future is dropped when its client goes
/// away; the drop guard then cancels the token the job checks between steps.
pub async fn run_detached<T, F, Fut>(job: F) -> Result<T, JobError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, JobError>> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    tokio::spawn(job(cancel))
        .await
        .map_err(|e| JobError::Internal(format!("Job task failed: {}", e)))?
}

/// Drives analysis jobs against the hub, the analysis provider and the store
#[derive(Clone)]
pub struct JobOrchestrator {
    hub: BroadcastHub,
    analysis: Arc<dyn AnalysisProvider>,
    transcriber: Arc<dyn Transcriber>,
    store: Arc<dyn MeetingStore>,
    config: OrchestratorConfig,
}

impl JobOrchestrator {
    pub fn new(
        hub: BroadcastHub,
        analysis: Arc<dyn AnalysisProvider>,
        transcriber: Arc<dyn Transcriber>,
        store: Arc<dyn MeetingStore>,
        config: OrchestratorConfig,
    ) -> Self {
        tracing::info!(
            analysis_provider = analysis.provider_id(),
            transcriber = transcriber.provider_id(),
            phase_delay_ms = config.phase_delay.as_millis() as u64,
            "Job orchestrator initialized"
        );
        Self {
            hub,
            analysis,
            transcriber,
            store,
            config,
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Simple analysis of free-form notes
    ///
    /// Phases `ExtractTopics`, `Decisions`, `Actions`. An analysis provider
    /// failure degrades to [`fallback_analysis`] instead of failing.
    pub async fn start_simple_analysis_job(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<SimpleJobResult, JobError> {
        if text.trim().is_empty() {
            return Err(JobError::Validation("Text is required.".to_string()));
        }
        self.run_simple(JobKind::Notes, &SIMPLE_PHASES, None, text, &cancel)
            .await
    }

    /// Simple analysis of a meeting's stored transcript
    ///
    /// Same as [`Self::start_simple_analysis_job`] with a leading
    /// `Transcript` phase, and the analysis filed under the meeting.
    pub async fn start_meeting_analysis_job(
        &self,
        meeting_id: i64,
        transcript_text: &str,
        cancel: CancellationToken,
    ) -> Result<SimpleJobResult, JobError> {
        if transcript_text.trim().is_empty() {
            return Err(JobError::Validation("Transcript is empty.".to_string()));
        }
        self.run_simple(
            JobKind::MeetingTranscript,
            &MEETING_PHASES,
            Some(meeting_id),
            transcript_text,
            &cancel,
        )
        .await
    }

    async fn run_simple(
        &self,
        kind: JobKind,
        phases: &[JobPhase],
        meeting_id: Option<i64>,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<SimpleJobResult, JobError> {
        let mut run = JobRun::new(kind);
        self.run_phases(&mut run, phases, cancel).await?;

        run.transition_to(JobState::AwaitingExternalCall);
        let analysis = match self.analysis.analyze(text).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(
                    job_id = %run.job_id,
                    provider = self.analysis.provider_id(),
                    error = %e,
                    "Analysis provider failed, using local fallback"
                );
                fallback_analysis(text)
            }
        };
        self.ensure_not_cancelled(&mut run, cancel)?;

        run.transition_to(JobState::Persisting);
        let new_analysis = NewAnalysis {
            meeting_id,
            raw_notes: text.to_string(),
            summary: analysis.summary,
            actions: analysis.actions,
        };
        let id = match self.store.save_analysis(new_analysis.clone()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(job_id = %run.job_id, error = %e, "Failed to save analysis");
                return Err(self
                    .fail(&mut run, JobError::Persistence("Could not save analysis".to_string()))
                    .await);
            }
        };

        let result = SimpleJobResult {
            id,
            summary: new_analysis.summary,
            actions: new_analysis.actions,
        };
        self.complete(&mut run, result.to_output()).await;
        Ok(result)
    }

    /// Detailed analysis of a meeting transcript
    ///
    /// Phases `ExtractTopics`, `KeyPoints`, `Decisions`, `Actions`, `Risks`.
    /// A provider failure fails the job: a `Failed` event is broadcast, no
    /// result event is sent, and the error is returned.
    pub async fn start_detailed_analysis_job(
        &self,
        request: DetailedJobRequest,
        cancel: CancellationToken,
    ) -> Result<DetailedJobResult, JobError> {
        if request.transcript_text.trim().is_empty() {
            return Err(JobError::Validation("Transcript is empty.".to_string()));
        }

        let mut run = JobRun::new(JobKind::Detailed);
        self.run_phases(&mut run, &DETAILED_PHASES, &cancel).await?;

        run.transition_to(JobState::AwaitingExternalCall);
        let detailed = match self
            .analysis
            .analyze_detailed(
                &request.meeting_title,
                &request.transcript_text,
                &request.segments,
            )
            .await
        {
            Ok(detailed) => detailed,
            Err(e) => {
                tracing::warn!(
                    job_id = %run.job_id,
                    provider = self.analysis.provider_id(),
                    error = %e,
                    "Transcript analysis failed"
                );
                if cancel.is_cancelled() {
                    run.transition_to(JobState::Cancelled);
                    return Err(JobError::Cancelled);
                }
                let error = JobError::JobFailed(describe_provider_error(&e));
                return Err(self.fail(&mut run, error).await);
            }
        };
        self.ensure_not_cancelled(&mut run, &cancel)?;

        run.transition_to(JobState::Persisting);
        let new_analysis = NewAnalysis {
            meeting_id: request.meeting_id,
            raw_notes: request.transcript_text.clone(),
            summary: detailed.executive_summary.clone(),
            actions: detailed
                .action_items
                .iter()
                .map(|item| item.display_line())
                .collect(),
        };
        let analysis_id = match self.store.save_analysis(new_analysis).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(job_id = %run.job_id, error = %e, "Failed to save analysis");
                return Err(self
                    .fail(&mut run, JobError::Persistence("Could not save analysis".to_string()))
                    .await);
            }
        };

        let result = DetailedJobResult {
            analysis_id,
            meeting_id: request.meeting_id,
            detailed,
        };
        self.complete(&mut run, result.to_output()).await;
        Ok(result)
    }

    /// Announce each phase in order, pacing between them
    async fn run_phases(
        &self,
        run: &mut JobRun,
        phases: &[JobPhase],
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        for (i, phase) in phases.iter().enumerate() {
            if i > 0 {
                self.pace(run, cancel).await?;
            }
            self.ensure_not_cancelled(run, cancel)?;

            run.transition_to(JobState::Phase(*phase));
            let delivered = self.hub.broadcast(HubEvent::progress(run.job_id, *phase)).await;
            tracing::debug!(job_id = %run.job_id, phase = %phase, delivered, "Progress broadcast");
        }
        Ok(())
    }

    async fn pace(&self, run: &mut JobRun, cancel: &CancellationToken) -> Result<(), JobError> {
        if self.config.phase_delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                run.transition_to(JobState::Cancelled);
                Err(JobError::Cancelled)
            }
            _ = tokio::time::sleep(self.config.phase_delay) => Ok(()),
        }
    }

    fn ensure_not_cancelled(
        &self,
        run: &mut JobRun,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        if cancel.is_cancelled() {
            run.transition_to(JobState::Cancelled);
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    /// Mark the job failed and tell every viewer; returns the error for the caller
    async fn fail(&self, run: &mut JobRun, error: JobError) -> JobError {
        run.transition_to(JobState::Failed);
        self.hub
            .broadcast(HubEvent::failed(run.job_id, error.to_string()))
            .await;
        error
    }

    async fn complete(&self, run: &mut JobRun, output: JobOutput) {
        run.transition_to(JobState::Completed);
        let delivered = self.hub.broadcast(HubEvent::result(run.job_id, output)).await;
        tracing::info!(job_id = %run.job_id, delivered, "Result broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_provider_error_hides_body() {
        let message = describe_provider_error(&ProviderError::ApiError(
            500,
            "{\"error\":\"secret upstream detail\"}".to_string(),
        ));
        assert_eq!(message, "AI provider returned status 500");

        let message = describe_provider_error(&ProviderError::NetworkError(
            "dns error: api.openai.com".to_string(),
        ));
        assert!(!message.contains("dns"));
    }

    #[tokio::test]
    async fn test_run_detached_returns_job_value() {
        let value = run_detached(|cancel| async move {
            assert!(!cancel.is_cancelled());
            Ok::<_, JobError>(42)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_dropping_run_detached_cancels_token() {
        let (tx, rx) = tokio::sync::oneshot::channel();

        let detached = run_detached(|cancel| async move {
            cancel.cancelled().await;
            let _ = tx.send(());
            Err::<(), _>(JobError::Cancelled)
        });

        // Poll once so the task is spawned, then drop the caller's future
        let _ = tokio::time::timeout(Duration::from_millis(20), detached).await;

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("job saw cancellation")
            .unwrap();
    }
}
