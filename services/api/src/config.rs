//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use festival_stories_core::ApiCredential;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// Credential variables in rotation order, with the display name each key is
/// reported under.
const CREDENTIAL_VARS: [(&str, &str); 4] = [
    ("OPENAI_API_KEY", "Primary"),
    ("OPENAI_API_KEY2", "Secondary"),
    ("OPENAI_API_KEY_BACKUP1", "Backup 1"),
    ("OPENAI_API_KEY_BACKUP2", "Backup 2"),
];

const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub data_dir: PathBuf,
    pub log_level: Level,
    pub cors_origin: String,
    /// Every configured OpenAI key, in rotation order. May be empty.
    pub credentials: Vec<ApiCredential>,
    pub enhancement_model: String,
    pub sst_model: String,
    pub max_upload_bytes: usize,
    /// Adds the demo storytellers and stories at startup.
    pub seed_sample_data: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Load Server and Storage Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load API Keys (all optional) ---
        let credentials = CREDENTIAL_VARS
            .iter()
            .filter_map(|(name, display)| {
                var(name)
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .map(|key| ApiCredential::new(*display, key))
            })
            .collect();

        // --- Load Adapter-specific Settings ---
        let enhancement_model =
            var("ENHANCEMENT_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let sst_model = var("SST_MODEL").unwrap_or_else(|| "whisper-1".to_string());
        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                ConfigError::InvalidValue("MAX_UPLOAD_BYTES".to_string(), e.to_string())
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let seed_sample_data = match var("SEED_SAMPLE_DATA") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SEED_SAMPLE_DATA".to_string(),
                    format!("'{}' is not true or false", raw),
                )
            })?,
            None => false,
        };

        Ok(Self {
            bind_address,
            data_dir,
            log_level,
            cors_origin,
            credentials,
            enhancement_model,
            sst_model,
            max_upload_bytes,
            seed_sample_data,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.credentials.is_empty());
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
        assert!(!config.seed_sample_data);
    }

    #[test]
    fn sample_data_flag_accepts_common_spellings() {
        let on = Config::from_lookup(lookup(&[("SEED_SAMPLE_DATA", "True")])).unwrap();
        assert!(on.seed_sample_data);
        let off = Config::from_lookup(lookup(&[("SEED_SAMPLE_DATA", "0")])).unwrap();
        assert!(!off.seed_sample_data);
        assert!(matches!(
            Config::from_lookup(lookup(&[("SEED_SAMPLE_DATA", "maybe")])),
            Err(ConfigError::InvalidValue(name, _)) if name == "SEED_SAMPLE_DATA"
        ));
    }

    #[test]
    fn credentials_keep_rotation_order_and_skip_blanks() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY_BACKUP1", "sk-b1"),
            ("OPENAI_API_KEY", "sk-p"),
            ("OPENAI_API_KEY2", "  "),
        ]))
        .unwrap();

        let names: Vec<&str> = config.credentials.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Primary", "Backup 1"]);
        assert_eq!(config.credentials[0].key, "sk-p");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("BIND_ADDRESS", "nowhere")])),
            Err(ConfigError::InvalidValue(name, _)) if name == "BIND_ADDRESS"
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("MAX_UPLOAD_BYTES", "lots")])),
            Err(ConfigError::InvalidValue(name, _)) if name == "MAX_UPLOAD_BYTES"
        ));
    }
}
