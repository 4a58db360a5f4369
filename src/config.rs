// src/config.rs
// Configuration file support.
//
// Loads config from ~/.skybeam/config.toml; every field can also come from
// the environment or CLI flags, with resolution handled in main.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Inference gateway endpoint (client side)
    pub gateway_url: Option<String>,

    /// Bearer token for the gateway, if it requires one
    pub gateway_api_key: Option<String>,

    /// Upstream completions API endpoint (relay side)
    pub upstream_url: Option<String>,

    /// Bearer token for the upstream API
    pub upstream_api_key: Option<String>,

    /// Model requested from the upstream API
    pub model: Option<String>,

    /// Database URL
    pub database_url: Option<String>,

    /// Default assistant persona
    pub assistant: Option<String>,

    /// User id recorded on conversations
    pub user_id: Option<String>,
}

impl Config {
    /// Load config from ~/.skybeam/config.toml.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load config from an explicit path. Missing or unparseable files fall
    /// back to defaults with a warning rather than aborting startup.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Get the config file path.
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".skybeam")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.gateway_url.is_none());
        assert!(config.assistant.is_none());
    }

    #[test]
    fn test_config_path() {
        let path = config_path();
        assert!(path.to_string_lossy().contains(".skybeam"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "gateway_url = \"http://localhost:3000/api/chat\"\nassistant = \"muse\""
        )
        .unwrap();

        let config = Config::load_from(file.path());
        assert_eq!(
            config.gateway_url.as_deref(),
            Some("http://localhost:3000/api/chat")
        );
        assert_eq!(config.assistant.as_deref(), Some("muse"));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_unparseable_file_falls_back_to_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [[[").unwrap();

        let config = Config::load_from(file.path());
        assert!(config.gateway_url.is_none());
    }
}
