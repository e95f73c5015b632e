//! Per-job state machine
//!
//! ```text
//! Started -> Phase(1) .. Phase(n) -> AwaitingExternalCall -> Persisting -> Completed
//!                                    AwaitingExternalCall | Persisting -> Failed
//!                          any non-terminal state -> Cancelled
//! ```

use chrono::{DateTime, Utc};
use meetnote_common::JobPhase;
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// Job family, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Simple analysis of pasted notes
    Notes,
    /// Simple analysis of a stored meeting transcript
    MeetingTranscript,
    /// Detailed transcript analysis
    Detailed,
}

/// Job workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "phase", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Started,
    Phase(JobPhase),
    AwaitingExternalCall,
    Persisting,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    /// Whether the workflow allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (*self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Cancelled) => true,
            (Started, Phase(_)) | (Phase(_), Phase(_)) => true,
            (Started, AwaitingExternalCall) | (Phase(_), AwaitingExternalCall) => true,
            (AwaitingExternalCall, Persisting) | (AwaitingExternalCall, Failed) => true,
            (Persisting, Completed) | (Persisting, Failed) => true,
            _ => false,
        }
    }
}

/// Record of one state change
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory state of one running job
///
/// Owned by the task driving the job; never shared between jobs.
#[derive(Debug)]
pub struct JobRun {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub state: JobState,
    started: Instant,
}

impl JobRun {
    pub fn new(kind: JobKind) -> Self {
        let job_id = Uuid::new_v4();
        tracing::info!(job_id = %job_id, kind = ?kind, "Job started");
        Self {
            job_id,
            kind,
            state: JobState::Started,
            started: Instant::now(),
        }
    }

    /// Move to a new state
    pub fn transition_to(&mut self, new_state: JobState) -> StateTransition {
        if !self.state.can_transition_to(new_state) {
            tracing::warn!(
                job_id = %self.job_id,
                from = ?self.state,
                to = ?new_state,
                "Unexpected job state transition"
            );
        }

        let transition = StateTransition {
            job_id: self.job_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            tracing::info!(
                job_id = %self.job_id,
                kind = ?self.kind,
                state = ?new_state,
                elapsed_ms = self.elapsed_ms(),
                "Job finished"
            );
        } else {
            tracing::debug!(job_id = %self.job_id, state = ?new_state, "Job state changed");
        }

        transition
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
