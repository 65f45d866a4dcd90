//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_EXTRACTION_API_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";

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
    pub log_level: Level,
    pub gemini_api_key: Option<String>,
    pub extraction_model: String,
    pub extraction_api_base: String,
    pub reveal_delay: Duration,
    pub export_filename_prefix: String,
    pub max_upload_bytes: usize,
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_level: Level::INFO,
            gemini_api_key: None,
            extraction_model: "gemini-2.0-flash".to_string(),
            extraction_api_base: DEFAULT_EXTRACTION_API_BASE.to_string(),
            reveal_delay: Duration::from_millis(200),
            export_filename_prefix: "student_data".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        // --- Server Settings ---
        let bind_address = match std::env::var("BIND_ADDRESS") {
            Ok(value) => value.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            Err(_) => defaults.bind_address,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?;

        // --- Extraction Service ---
        // The credential is optional here; its absence disables image extraction.
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        let extraction_model =
            std::env::var("EXTRACTION_MODEL").unwrap_or(defaults.extraction_model);
        let extraction_api_base =
            std::env::var("EXTRACTION_API_BASE").unwrap_or(defaults.extraction_api_base);

        // --- Presentation ---
        let reveal_delay_ms = defaults.reveal_delay.as_millis() as u64;
        let reveal_delay = Duration::from_millis(parse_var("REVEAL_DELAY_MS", reveal_delay_ms)?);
        let export_filename_prefix =
            std::env::var("EXPORT_FILENAME_PREFIX").unwrap_or(defaults.export_filename_prefix);

        Ok(Self {
            bind_address,
            log_level,
            gemini_api_key,
            extraction_model,
            extraction_api_base,
            reveal_delay,
            export_filename_prefix,
            max_upload_bytes,
            cors_origin,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
