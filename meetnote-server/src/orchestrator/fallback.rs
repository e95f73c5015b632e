//! Deterministic local result used when the simple analysis call fails

use meetnote_common::events::AnalysisSummary;

/// Actions reported by the local fallback, in order
pub const FALLBACK_ACTIONS: [&str; 3] = [
    "Follow up on topic A",
    "Decide next steps for B",
    "Schedule next meeting",
];

/// Summary of `text` that needs no external service
///
/// The word count is clamped to 1..=50.
pub fn fallback_analysis(text: &str) -> AnalysisSummary {
    let words = text.split_whitespace().count().clamp(1, 50);
    AnalysisSummary {
        summary: format!("Auto-summary (offline). ~{} words processed.", words),
        actions: FALLBACK_ACTIONS.iter().map(|a| a.to_string()).collect(),
    }
}
