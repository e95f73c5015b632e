//! Server configuration resolution
//!
//! Priority for every setting: command line → environment → TOML → default.
//! clap fills [`CliOverrides`] from both the command line and the
//! environment; this module layers the TOML file and the defaults beneath.

use meetnote_common::config::{resolve_root_folder, TomlConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::hub::{HubConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_SEND_GRACE};
use crate::orchestrator::{OrchestratorConfig, DEFAULT_PHASE_DELAY};
use crate::services::openai_client::{
    OpenAiConfig, DEFAULT_ANALYSIS_MODEL, DEFAULT_BASE_URL, DEFAULT_TRANSCRIPTION_MODEL,
};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5168;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Settings given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub root_folder: Option<PathBuf>,
    pub cors_origin: Option<String>,
    pub openai_api_key: Option<String>,
    pub phase_delay_ms: Option<u64>,
}

/// Fully resolved server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub root_folder: PathBuf,
    pub cors_origin: String,
    /// `None` when no API key is configured anywhere
    pub openai: Option<OpenAiConfig>,
    pub hub: HubConfig,
    pub keep_alive: Duration,
    pub orchestrator: OrchestratorConfig,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ServerConfig {
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Self {
        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), toml);

        let api_key = non_blank(cli.openai_api_key.as_deref())
            .or_else(|| non_blank(toml.openai.api_key.as_deref()));
        let openai = api_key.map(|key| OpenAiConfig {
            base_url: non_blank(toml.openai.base_url.as_deref())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            analysis_model: non_blank(toml.openai.analysis_model.as_deref())
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            transcription_model: non_blank(toml.openai.transcription_model.as_deref())
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            ..OpenAiConfig::new(key)
        });

        let hub = HubConfig {
            queue_capacity: toml.hub.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            send_grace: toml
                .hub
                .send_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SEND_GRACE),
        };

        let phase_delay = cli
            .phase_delay_ms
            .or(toml.jobs.phase_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PHASE_DELAY);

        Self {
            host: non_blank(cli.host.as_deref())
                .or_else(|| non_blank(toml.host.as_deref()))
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            root_folder,
            cors_origin: non_blank(cli.cors_origin.as_deref())
                .or_else(|| non_blank(toml.cors_origin.as_deref()))
                .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            openai,
            hub,
            keep_alive: toml
                .hub
                .keep_alive_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_KEEP_ALIVE),
            orchestrator: OrchestratorConfig { phase_delay },
        }
    }

    /// Log the effective settings (never the API key)
    pub fn log_summary(&self) {
        info!("Root folder: {}", self.root_folder.display());
        info!("CORS origin: {}", self.cors_origin);
        match &self.openai {
            Some(openai) => info!(
                base_url = %openai.base_url,
                analysis_model = %openai.analysis_model,
                transcription_model = %openai.transcription_model,
                "OpenAI provider configured"
            ),
            None => info!("No OpenAI API key configured; notes analysis will use the local fallback"),
        }
        info!(
            phase_delay_ms = self.orchestrator.phase_delay.as_millis() as u64,
            keep_alive_secs = self.keep_alive.as_secs(),
            "Job pacing"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetnote_common::config::{HubSection, JobsSection, OpenAiSection};

    #[test]
    fn test_defaults_without_any_source() {
        let config = ServerConfig::resolve(
            &CliOverrides {
                root_folder: Some(PathBuf::from("/tmp/meetnote-test")),
                ..Default::default()
            },
            &TomlConfig::default(),
        );

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cors_origin, DEFAULT_CORS_ORIGIN);
        assert!(config.openai.is_none());
        assert_eq!(config.hub.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.orchestrator.phase_delay, DEFAULT_PHASE_DELAY);
        assert_eq!(config.keep_alive, DEFAULT_KEEP_ALIVE);
    }

    #[test]
    fn test_cli_wins_over_toml() {
        let toml = TomlConfig {
            port: Some(9000),
            openai: OpenAiSection {
                api_key: Some("sk-toml".to_string()),
                analysis_model: Some("gpt-test".to_string()),
                ..Default::default()
            },
            jobs: JobsSection {
                phase_delay_ms: Some(50),
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            port: Some(7000),
            root_folder: Some(PathBuf::from("/tmp/meetnote-test")),
            openai_api_key: Some("sk-cli".to_string()),
            phase_delay_ms: Some(0),
            ..Default::default()
        };

        let config = ServerConfig::resolve(&cli, &toml);
        assert_eq!(config.port, 7000);
        assert_eq!(config.orchestrator.phase_delay, Duration::ZERO);

        let openai = config.openai.unwrap();
        assert_eq!(openai.api_key, "sk-cli");
        assert_eq!(openai.analysis_model, "gpt-test");
        assert_eq!(openai.transcription_model, DEFAULT_TRANSCRIPTION_MODEL);
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let toml = TomlConfig {
            openai: OpenAiSection {
                api_key: Some("   ".to_string()),
                ..Default::default()
            },
            hub: HubSection {
                queue_capacity: Some(8),
                send_grace_ms: Some(100),
                keep_alive_secs: Some(5),
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            root_folder: Some(PathBuf::from("/tmp/meetnote-test")),
            ..Default::default()
        };

        let config = ServerConfig::resolve(&cli, &toml);
        assert!(config.openai.is_none());
        assert_eq!(config.hub.queue_capacity, 8);
        assert_eq!(config.hub.send_grace, Duration::from_millis(100));
        assert_eq!(config.keep_alive, Duration::from_secs(5));
    }
}
