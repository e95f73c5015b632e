//! External capabilities used by the job orchestrator
//!
//! The orchestrator only sees the traits defined here. The OpenAI-backed
//! implementation lives in [`openai_client`]; [`UnconfiguredProvider`] stands
//! in when no API key is configured so the server still starts (simple jobs
//! degrade to the local fallback, detailed jobs and transcription fail).

pub mod openai_client;
pub mod prompts;

pub use openai_client::{OpenAiClient, OpenAiConfig};

use async_trait::async_trait;
use meetnote_common::events::{AnalysisSummary, DetailedAnalysis, TranscriptSegment};
use thiserror::Error;

/// Errors reported by an external capability
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Uploaded audio handed to a [`Transcriber`]
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Transcriber output; `segments` are ordered by index
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub language: String,
    pub duration_seconds: f64,
    pub segments: Vec<TranscriptSegment>,
}

/// Long-latency text analysis
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Provider identifier for logs
    fn provider_id(&self) -> &'static str;

    /// Summarize free-form notes into a summary and ordered actions
    async fn analyze(&self, text: &str) -> Result<AnalysisSummary, ProviderError>;

    /// Structured analysis of a meeting transcript
    ///
    /// `segments` are ordered by index and may be empty, in which case only
    /// `full_text` is available.
    async fn analyze_detailed(
        &self,
        meeting_title: &str,
        full_text: &str,
        segments: &[TranscriptSegment],
    ) -> Result<DetailedAnalysis, ProviderError>;

    /// Short meeting title derived from transcript text
    async fn generate_title(&self, text: &str) -> Result<String, ProviderError>;
}

/// Speech to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn provider_id(&self) -> &'static str;

    async fn transcribe(&self, audio: AudioUpload) -> Result<Transcription, ProviderError>;
}

/// Placeholder used when no provider credentials are configured
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredProvider;

impl UnconfiguredProvider {
    fn error() -> ProviderError {
        ProviderError::NotConfigured("no OpenAI API key set".to_string())
    }
}

#[async_trait]
impl AnalysisProvider for UnconfiguredProvider {
    fn provider_id(&self) -> &'static str {
        "unconfigured"
    }

    async fn analyze(&self, _text: &str) -> Result<AnalysisSummary, ProviderError> {
        Err(Self::error())
    }

    async fn analyze_detailed(
        &self,
        _meeting_title: &str,
        _full_text: &str,
        _segments: &[TranscriptSegment],
    ) -> Result<DetailedAnalysis, ProviderError> {
        Err(Self::error())
    }

    async fn generate_title(&self, _text: &str) -> Result<String, ProviderError> {
        Err(Self::error())
    }
}

#[async_trait]
impl Transcriber for UnconfiguredProvider {
    fn provider_id(&self) -> &'static str {
        "unconfigured"
    }

    async fn transcribe(&self, _audio: AudioUpload) -> Result<Transcription, ProviderError> {
        Err(Self::error())
    }
}
