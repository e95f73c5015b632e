//! Analysis payload types carried by result events and HTTP responses

use serde::{Deserialize, Serialize};

/// Output of the simple analysis family: a summary plus ordered action strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// Free-text summary of the notes
    pub summary: String,
    /// Action items in the order the analyzer produced them
    pub actions: Vec<String>,
}

/// One action item from a detailed transcript analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub task: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

impl ActionItem {
    /// Flat rendering used for the history list: `task (Owner: owner)`
    pub fn display_line(&self) -> String {
        match self.owner.as_deref().map(str::trim) {
            Some(owner) if !owner.is_empty() => format!("{} (Owner: {})", self.task, owner),
            _ => self.task.clone(),
        }
    }
}

/// Output of the detailed transcript analysis family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    #[serde(default)]
    pub title: String,
    pub executive_summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
}

/// One timed transcript segment, ordered by `index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub index: u32,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Terminal output of a job, as carried by `HubEvent::Result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobOutput {
    /// Simple analysis of notes or a stored transcript
    Simple {
        analysis_id: i64,
        summary: String,
        actions: Vec<String>,
    },

    /// Detailed transcript analysis
    Detailed {
        analysis_id: i64,
        meeting_id: Option<i64>,
        detailed: DetailedAnalysis,
    },
}

impl JobOutput {
    /// Identifier of the persisted analysis record
    pub fn analysis_id(&self) -> i64 {
        match self {
            JobOutput::Simple { analysis_id, .. } | JobOutput::Detailed { analysis_id, .. } => {
                *analysis_id
            }
        }
    }
}
