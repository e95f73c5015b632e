//! OpenAI HTTP client implementing the analysis and transcription capabilities

use super::prompts::{
    clean_title, detailed_user_prompt, DETAILED_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT,
    TITLE_SYSTEM_PROMPT,
};
use super::{AnalysisProvider, AudioUpload, ProviderError, Transcriber, Transcription};
use async_trait::async_trait;
use meetnote_common::events::{AnalysisSummary, DetailedAnalysis, TranscriptSegment};
use mime::Mime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-mini-transcribe";
const USER_AGENT: &str = concat!("meetnote/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Connection settings for [`OpenAiClient`]
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub analysis_model: String,
    pub transcription_model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Settings with default endpoint and models
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
    language: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: Option<f64>,
    end: Option<f64>,
    text: Option<String>,
}

/// OpenAI API client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("empty OpenAI API key".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            config: OpenAiConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// One chat completion; returns the assistant message text
    async fn chat(&self, system: &str, user: &str, json_reply: bool) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.config.analysis_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: json_reply.then_some(ResponseFormat { kind: "json_object" }),
        };

        let started = Instant::now();
        let response = self
            .http_client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(status.as_u16(), error_text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        tracing::debug!(
            model = %self.config.analysis_model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chat completion returned"
        );

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

/// Decode a JSON reply, tolerating a surrounding markdown code fence
fn parse_json_reply<T: DeserializeOwned>(content: &str) -> Result<T, ProviderError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim()).map_err(|e| ProviderError::ParseError(e.to_string()))
}

fn into_transcription(response: TranscriptionResponse) -> Transcription {
    let segments = response
        .segments
        .into_iter()
        .enumerate()
        .map(|(index, s)| TranscriptSegment {
            index: index as u32,
            start_seconds: s.start.unwrap_or(0.0),
            end_seconds: s.end.unwrap_or(0.0),
            text: s.text.unwrap_or_default().trim().to_string(),
        })
        .collect();

    Transcription {
        text: response.text.unwrap_or_default().trim().to_string(),
        language: response
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        duration_seconds: response.duration.unwrap_or(0.0),
        segments,
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiClient {
    fn provider_id(&self) -> &'static str {
        "openai"
    }

    async fn analyze(&self, text: &str) -> Result<AnalysisSummary, ProviderError> {
        let reply = self.chat(SUMMARY_SYSTEM_PROMPT, text, true).await?;
        let analysis: AnalysisSummary = parse_json_reply(&reply)?;

        if analysis.summary.trim().is_empty() {
            return Err(ProviderError::ParseError("summary is empty".to_string()));
        }

        tracing::info!(actions = analysis.actions.len(), "Notes analysis completed");
        Ok(analysis)
    }

    async fn analyze_detailed(
        &self,
        meeting_title: &str,
        full_text: &str,
        segments: &[TranscriptSegment],
    ) -> Result<DetailedAnalysis, ProviderError> {
        let prompt = detailed_user_prompt(meeting_title, full_text, segments);
        let reply = self.chat(DETAILED_SYSTEM_PROMPT, &prompt, true).await?;
        let mut detailed: DetailedAnalysis = parse_json_reply(&reply)?;

        if detailed.title.trim().is_empty() {
            detailed.title = meeting_title.trim().to_string();
        }

        tracing::info!(
            key_points = detailed.key_points.len(),
            decisions = detailed.decisions.len(),
            action_items = detailed.action_items.len(),
            "Transcript analysis completed"
        );
        Ok(detailed)
    }

    async fn generate_title(&self, text: &str) -> Result<String, ProviderError> {
        let reply = self.chat(TITLE_SYSTEM_PROMPT, text, false).await?;
        let title = clean_title(&reply);
        if title.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(title)
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    fn provider_id(&self) -> &'static str {
        "openai"
    }

    async fn transcribe(&self, audio: AudioUpload) -> Result<Transcription, ProviderError> {
        let model = self.config.transcription_model.clone();
        // Only the whisper models return timed segments
        let response_format = if model.starts_with("whisper") {
            "verbose_json"
        } else {
            "json"
        };

        let size_bytes = audio.bytes.len();
        let content_type = upload_mime(audio.content_type.as_deref());
        let file_part = reqwest::multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(content_type.as_ref())
            .map_err(|e| ProviderError::ParseError(format!("Invalid audio content type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("model", model)
            .text("response_format", response_format)
            .part("file", file_part);

        tracing::debug!(size_bytes, response_format, "Uploading audio for transcription");

        let response = self
            .http_client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(status.as_u16(), error_text));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let transcription = into_transcription(parsed);
        tracing::info!(
            language = %transcription.language,
            duration_seconds = transcription.duration_seconds,
            segments = transcription.segments.len(),
            "Transcription completed"
        );
        Ok(transcription)
    }
}

/// Content type forwarded with an uploaded file
///
/// Whatever the client declared, as long as it parses; otherwise
/// `application/octet-stream`.
fn upload_mime(declared: Option<&str>) -> Mime {
    match declared.map(str::parse::<Mime>) {
        Some(Ok(mime)) => mime,
        Some(Err(e)) => {
            tracing::debug!(error = %e, "Ignoring unparseable upload content type");
            mime::APPLICATION_OCTET_STREAM
        }
        None => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_key() {
        let result = OpenAiClient::new(OpenAiConfig::new("   "));
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = OpenAiConfig {
            base_url: "http://localhost:9000/v1/".to_string(),
            ..OpenAiConfig::new("sk-test")
        };
        let client = OpenAiClient::new(config).unwrap();
        assert_eq!(
            client.endpoint("chat/completions"),
            "http://localhost:9000/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_json_reply_plain_and_fenced() {
        let plain: AnalysisSummary =
            parse_json_reply(r#"{"summary":"Budget talk.","actions":["Send draft"]}"#).unwrap();
        assert_eq!(plain.actions, vec!["Send draft".to_string()]);

        let fenced: AnalysisSummary =
            parse_json_reply("```json\n{\"summary\":\"S\",\"actions\":[]}\n```").unwrap();
        assert_eq!(fenced.summary, "S");
    }

    #[test]
    fn test_parse_json_reply_rejects_malformed() {
        let result = parse_json_reply::<AnalysisSummary>("Sure! Here is your summary.");
        assert!(matches!(result, Err(ProviderError::ParseError(_))));
    }

    #[test]
    fn test_into_transcription_defaults_and_indexes() {
        let response: TranscriptionResponse = serde_json::from_str(
            r#"{"text":" Hello team. ","segments":[{"start":0.0,"end":1.5,"text":" Hello "},{"start":1.5,"end":2.0,"text":"team."}]}"#,
        )
        .unwrap();

        let transcription = into_transcription(response);
        assert_eq!(transcription.text, "Hello team.");
        assert_eq!(transcription.language, "unknown");
        assert_eq!(transcription.duration_seconds, 0.0);
        assert_eq!(transcription.segments.len(), 2);
        assert_eq!(transcription.segments[0].text, "Hello");
        assert_eq!(transcription.segments[1].index, 1);
    }

    #[test]
    fn test_upload_mime_keeps_valid_and_replaces_malformed() {
        assert_eq!(upload_mime(Some("audio/mpeg")).as_ref(), "audio/mpeg");
        assert_eq!(upload_mime(Some("audio/webm;codecs=opus")).essence_str(), "audio/webm");
        assert_eq!(upload_mime(Some("not a mime")), mime::APPLICATION_OCTET_STREAM);
        assert_eq!(upload_mime(Some("")), mime::APPLICATION_OCTET_STREAM);
        assert_eq!(upload_mime(None), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_malformed_content_type_still_builds_file_part() {
        let part = reqwest::multipart::Part::bytes(b"ID3".to_vec())
            .file_name("standup.mp3")
            .mime_str(upload_mime(Some("audio;;mpeg")).as_ref());
        assert!(part.is_ok());
    }
}
