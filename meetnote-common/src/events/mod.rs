//! Event types for the MeetNote realtime channel
//!
//! Every record pushed to a connected client is a [`HubEvent`]. The enum is
//! closed: clients can match exhaustively on the `kind` tag.

mod analysis_types;

pub use analysis_types::{ActionItem, AnalysisSummary, DetailedAnalysis, JobOutput, TranscriptSegment};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named, ordered step of a job reported before the expensive external call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPhase {
    /// Transcript loaded from storage (meeting jobs only)
    Transcript,
    /// Topic detection
    ExtractTopics,
    /// Key point extraction (detailed jobs)
    KeyPoints,
    /// Decision identification
    Decisions,
    /// Action item generation
    Actions,
    /// Risk and open-question assessment (detailed jobs)
    Risks,
}

impl JobPhase {
    /// Phase name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Transcript => "Transcript",
            JobPhase::ExtractTopics => "ExtractTopics",
            JobPhase::KeyPoints => "KeyPoints",
            JobPhase::Decisions => "Decisions",
            JobPhase::Actions => "Actions",
            JobPhase::Risks => "Risks",
        }
    }

    /// Human-readable progress message shown while the phase runs
    pub fn default_message(&self) -> &'static str {
        match self {
            JobPhase::Transcript => "Loaded transcript from database...",
            JobPhase::ExtractTopics => "Detecting key topics...",
            JobPhase::KeyPoints => "Extracting key points...",
            JobPhase::Decisions => "Identifying decisions...",
            JobPhase::Actions => "Generating action items...",
            JobPhase::Risks => "Assessing risks and open questions...",
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Realtime event delivered to connected clients
///
/// Job events (`Progress`, `Result`, `Failed`) are broadcast to every live
/// connection and carry the `job_id` of the job that produced them, since
/// events from concurrent jobs interleave on the shared channel.
/// `Connected` and `Pong` are only ever sent to a single connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HubEvent {
    /// First event on a new connection, tells the client its identifier
    Connected {
        connection_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A job entered a new phase
    Progress {
        job_id: Uuid,
        phase: JobPhase,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A job completed; sent exactly once per successful job
    Result {
        job_id: Uuid,
        output: JobOutput,
        timestamp: DateTime<Utc>,
    },

    /// A job failed after it started emitting progress
    Failed {
        job_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Reply to a client ping
    Pong {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl HubEvent {
    /// Create a progress event with the phase's default message
    pub fn progress(job_id: Uuid, phase: JobPhase) -> Self {
        Self::Progress {
            job_id,
            phase,
            message: phase.default_message().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Create a result event
    pub fn result(job_id: Uuid, output: JobOutput) -> Self {
        Self::Result {
            job_id,
            output,
            timestamp: Utc::now(),
        }
    }

    /// Create a failure event
    pub fn failed(job_id: Uuid, message: impl Into<String>) -> Self {
        Self::Failed {
            job_id,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create the greeting sent to a freshly registered connection
    pub fn connected(connection_id: Uuid) -> Self {
        Self::Connected {
            connection_id,
            timestamp: Utc::now(),
        }
    }

    /// Create a ping reply
    pub fn pong(message: impl Into<String>) -> Self {
        Self::Pong {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Event kind, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            HubEvent::Connected { .. } => "connected",
            HubEvent::Progress { .. } => "progress",
            HubEvent::Result { .. } => "result",
            HubEvent::Failed { .. } => "failed",
            HubEvent::Pong { .. } => "pong",
        }
    }

    /// Job that produced this event, if it is a job event
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            HubEvent::Progress { job_id, .. }
            | HubEvent::Result { job_id, .. }
            | HubEvent::Failed { job_id, .. } => Some(*job_id),
            HubEvent::Connected { .. } | HubEvent::Pong { .. } => None,
        }
    }
}
