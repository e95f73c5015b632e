//! Prompt text sent to the analysis model

use meetnote_common::events::TranscriptSegment;
use std::fmt::Write;

/// System prompt for the simple notes analysis
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an assistant that summarizes meeting notes. \
Reply with a JSON object of the form {\"summary\": string, \"actions\": [string]}. \
The summary is at most three sentences. Each action is a short imperative sentence. \
Use the language of the notes.";

/// System prompt for the detailed transcript analysis
pub const DETAILED_SYSTEM_PROMPT: &str = "You analyze meeting transcripts. \
Reply with a single JSON object with the keys: \
\"title\" (string), \"executiveSummary\" (string), \"keyPoints\" (array of strings), \
\"decisions\" (array of strings), \
\"actionItems\" (array of objects with \"task\", and optional \"owner\", \"dueDate\", \"context\"), \
\"risks\" (array of strings), \"openQuestions\" (array of strings). \
Only report what the transcript supports; use null for unknown owners or dates. \
Use the language of the transcript.";

/// System prompt for meeting title generation
pub const TITLE_SYSTEM_PROMPT: &str = "Write a short, specific title (at most eight words) \
for the meeting described by the transcript excerpt. Reply with the title only, \
without quotes or trailing punctuation.";

/// `mm:ss`, or `h:mm:ss` past the first hour
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// User message for the detailed analysis
///
/// With segments, each line is prefixed with its time range so the model can
/// refer to when things were said. Without segments the full text is used.
pub fn detailed_user_prompt(
    meeting_title: &str,
    full_text: &str,
    segments: &[TranscriptSegment],
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Meeting title: {}", meeting_title.trim());
    prompt.push('\n');

    if segments.is_empty() {
        prompt.push_str("Transcript:\n");
        prompt.push_str(full_text.trim());
    } else {
        prompt.push_str("Transcript segments:\n");
        for segment in segments {
            let _ = writeln!(
                prompt,
                "[{} - {}] {}",
                format_timestamp(segment.start_seconds),
                format_timestamp(segment.end_seconds),
                segment.text.trim()
            );
        }
    }

    prompt
}

/// Strip quotes, surrounding whitespace and trailing periods from a model title
pub fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
        .trim_end_matches('.')
        .trim()
        .to_string()
}
