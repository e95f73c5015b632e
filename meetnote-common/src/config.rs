//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line and environment handling lives in the binary (clap `env`
//! attributes); this module provides the TOML layer and the defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "meetnote.db";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "MEETNOTE_ROOT_FOLDER";

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database
    pub root_folder: Option<String>,
    /// Bind host
    pub host: Option<String>,
    /// Bind port
    pub port: Option<u16>,
    /// Browser origin allowed by CORS
    pub cors_origin: Option<String>,
    /// External AI provider settings
    pub openai: OpenAiSection,
    /// Realtime hub tuning
    pub hub: HubSection,
    /// Job pacing
    pub jobs: JobsSection,
}

/// `[openai]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub analysis_model: Option<String>,
    pub transcription_model: Option<String>,
}

/// `[hub]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HubSection {
    /// Events buffered per connection before it counts as slow
    pub queue_capacity: Option<usize>,
    /// How long a broadcast waits on a full connection queue
    pub send_grace_ms: Option<u64>,
    /// SSE keep-alive interval
    pub keep_alive_secs: Option<u64>,
}

/// `[jobs]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobsSection {
    /// Pause between progress phases
    pub phase_delay_ms: Option<u64>,
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load the config file from an explicit path, or from the platform default
/// location when none is given
///
/// A missing default file is not an error (all keys have defaults); a missing
/// explicit file or a malformed file is.
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit_path {
        if !path.exists() {
            return Err(Error::Config(format!("Config file not found: {}", path.display())));
        }
        return load_toml_config(path);
    }

    match default_config_path() {
        Some(path) => load_toml_config(&path),
        None => {
            debug!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Locate the platform config file, if one exists
///
/// Linux: `~/.config/meetnote/config.toml`, then `/etc/meetnote/config.toml`.
/// Other platforms: the user config directory only.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("meetnote").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/meetnote/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the root folder following the standard priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml.root_folder.as_deref() {
        return PathBuf::from(path);
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("meetnote"))
        .unwrap_or_else(|| PathBuf::from("./meetnote_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn ensure_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
root_folder = "/srv/meetnote"
port = 5168
cors_origin = "http://localhost:5173"

[openai]
api_key = "sk-test"
analysis_model = "gpt-4o-mini"

[hub]
queue_capacity = 32
send_grace_ms = 250

[jobs]
phase_delay_ms = 0
"#
        )
        .unwrap();

        let config = load_toml_config(file.path()).unwrap();
        assert_eq!(config.root_folder.as_deref(), Some("/srv/meetnote"));
        assert_eq!(config.port, Some(5168));
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.openai.base_url, None);
        assert_eq!(config.hub.queue_capacity, Some(32));
        assert_eq!(config.hub.send_grace_ms, Some(250));
        assert_eq!(config.jobs.phase_delay_ms, Some(0));
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        match load_toml_config(file.path()) {
            Err(Error::Config(msg)) => assert!(msg.contains("Invalid config file")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let result = load_config(Some(Path::new("/nonexistent/meetnote/config.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_root_folder_priority() {
        std::env::remove_var(ROOT_FOLDER_ENV);
        let toml = TomlConfig {
            root_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };

        // CLI wins over everything
        assert_eq!(
            resolve_root_folder(Some(Path::new("/from/cli")), &toml),
            PathBuf::from("/from/cli")
        );

        // TOML used when no CLI and no env
        assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/from/toml"));

        // Env wins over TOML
        std::env::set_var(ROOT_FOLDER_ENV, "/from/env");
        assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/from/env"));
        std::env::remove_var(ROOT_FOLDER_ENV);

        // Default when nothing is configured
        let fallback = resolve_root_folder(None, &TomlConfig::default());
        assert!(fallback.ends_with("meetnote") || fallback.ends_with("meetnote_data"));
    }

    #[test]
    fn test_ensure_root_folder_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("root");

        let db_path = ensure_root_folder(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(db_path, root.join(DATABASE_FILE));
    }
}
