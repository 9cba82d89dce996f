//! Configuration management for `CareMap`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::CareMapError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `CareMap` backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CareMapConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Assistant proxy configuration
    pub assistant: AssistantConfig,
    /// Dataset normalizer defaults
    pub normalizer: NormalizerConfig,
    /// Offline asset cache configuration
    pub offline: OfflineConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Normalized clinic list, read once at startup
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Directory the widget's static assets are served from
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
    /// Maximum accepted request body size
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

/// Assistant proxy configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Upstream credential. Absent means the assistant runs disabled.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_assistant_base_url")]
    pub base_url: String,
    /// Completion model
    #[serde(default = "default_assistant_model")]
    pub model: String,
    /// Fixed system instruction sent ahead of every prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Request timeout in seconds
    #[serde(default = "default_assistant_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    #[serde(default = "default_assistant_max_retries")]
    pub max_retries: u32,
}

/// Dataset normalizer defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Region (state abbreviation) kept by the normalizer
    #[serde(default = "default_region")]
    pub region: String,
    /// Keep only sites whose status is `Active`
    #[serde(default)]
    pub active_only: bool,
}

/// Offline asset cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Name of the live cache generation
    #[serde(default = "default_cache_name")]
    pub cache_name: String,
    /// Cache directory location
    #[serde(default = "default_cache_location")]
    pub location: PathBuf,
    /// Assets fetched into the cache on install
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/clinics.json")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_request_timeout() -> u32 {
    30
}

fn default_body_limit() -> usize {
    64 * 1024
}

fn default_assistant_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_assistant_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant for finding free or low-cost clinics in the US. \
     Be brief, local, and relevant to the user's query."
        .to_string()
}

fn default_assistant_timeout() -> u32 {
    30
}

fn default_assistant_max_retries() -> u32 {
    2
}

fn default_region() -> String {
    "TX".to_string()
}

fn default_cache_name() -> String {
    "caremap-cache-v1".to_string()
}

fn default_cache_location() -> PathBuf {
    PathBuf::from(".cache/caremap")
}

fn default_precache() -> Vec<String> {
    [
        "index.html",
        "app.js",
        "manifest.json",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
        "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
        "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl ServerConfig {
    /// Time the assistant proxy may spend on one `/ask`, kept below the
    /// request timeout so the handler can still answer.
    #[must_use]
    pub fn assistant_budget(&self) -> std::time::Duration {
        let request = std::time::Duration::from_secs(self.request_timeout_seconds.into());
        request - request / 5
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_path: default_data_path(),
            static_dir: default_static_dir(),
            request_timeout_seconds: default_request_timeout(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_assistant_base_url(),
            model: default_assistant_model(),
            system_prompt: default_system_prompt(),
            timeout_seconds: default_assistant_timeout(),
            max_retries: default_assistant_max_retries(),
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            active_only: false,
        }
    }
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            location: default_cache_location(),
            precache: default_precache(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl CareMapConfig {
    /// Load configuration from `config_path` (or the default location) and
    /// `CAREMAP_` environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // CAREMAP_SERVER__PORT=8080, CAREMAP_ASSISTANT__API_KEY=...
        builder = builder.add_source(
            Environment::with_prefix("CAREMAP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: CareMapConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_conventional_env();
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("caremap").join("config.toml"))
    }

    /// Honor the conventional `PORT` and `OPENAI_API_KEY` variables used by
    /// hosting platforms.
    fn apply_conventional_env(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if self.assistant.api_key.is_none() {
            self.assistant.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        if self.server.port == 0 {
            self.server.port = default_port();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.server.body_limit_bytes == 0 {
            self.server.body_limit_bytes = default_body_limit();
        }
        // An empty key is the same as no key: the assistant runs disabled.
        if self
            .assistant
            .api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            self.assistant.api_key = None;
        }
        if self.assistant.base_url.is_empty() {
            self.assistant.base_url = default_assistant_base_url();
        }
        if self.assistant.model.is_empty() {
            self.assistant.model = default_assistant_model();
        }
        if self.assistant.system_prompt.is_empty() {
            self.assistant.system_prompt = default_system_prompt();
        }
        if self.assistant.timeout_seconds == 0 {
            self.assistant.timeout_seconds = default_assistant_timeout();
        }
        if self.normalizer.region.is_empty() {
            self.normalizer.region = default_region();
        }
        if self.offline.cache_name.is_empty() {
            self.offline.cache_name = default_cache_name();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.request_timeout_seconds > 300 {
            return Err(
                CareMapError::config("Request timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.assistant.timeout_seconds > 300 {
            return Err(
                CareMapError::config("Assistant timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.assistant.max_retries > 10 {
            return Err(CareMapError::config("Assistant max retries cannot exceed 10").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(CareMapError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(CareMapError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let region = &self.normalizer.region;
        if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CareMapError::config(format!(
                "Invalid region '{region}'. Must be a two-letter state abbreviation"
            ))
            .into());
        }

        if !self.assistant.base_url.starts_with("http://")
            && !self.assistant.base_url.starts_with("https://")
        {
            return Err(CareMapError::config(
                "Assistant base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        Ok(())
    }

    /// Whether an upstream credential is configured
    #[must_use]
    pub fn assistant_enabled(&self) -> bool {
        self.assistant.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CareMapConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.data_path, PathBuf::from("data/clinics.json"));
        assert_eq!(config.assistant.base_url, "https://api.openai.com/v1");
        assert_eq!(config.assistant.model, "gpt-3.5-turbo");
        assert_eq!(config.normalizer.region, "TX");
        assert_eq!(config.offline.cache_name, "caremap-cache-v1");
        assert_eq!(config.logging.level, "info");
        assert!(config.assistant.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_is_valid() {
        let config = CareMapConfig::default();
        assert!(!config.assistant_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_api_key_disables_assistant() {
        let mut config = CareMapConfig::default();
        config.assistant.api_key = Some("   ".to_string());
        config.apply_defaults();
        assert!(!config.assistant_enabled());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = CareMapConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = CareMapConfig::default();
        config.assistant.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_assistant_budget_is_below_request_timeout() {
        let mut config = CareMapConfig::default();
        assert_eq!(
            config.server.assistant_budget(),
            std::time::Duration::from_secs(24)
        );
        config.server.request_timeout_seconds = 1;
        assert_eq!(
            config.server.assistant_budget(),
            std::time::Duration::from_millis(800)
        );
    }

    #[test]
    fn test_config_validation_region() {
        let mut config = CareMapConfig::default();
        config.normalizer.region = "Texas".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid region"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8081
data_path = "fixtures/clinics.json"

[normalizer]
region = "CA"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = CareMapConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.server.data_path, PathBuf::from("fixtures/clinics.json"));
        assert_eq!(config.normalizer.region, "CA");
        assert_eq!(config.logging.format, "json");
        // Untouched sections keep their defaults.
        assert_eq!(config.assistant.model, "gpt-3.5-turbo");
        assert_eq!(config.offline.precache.len(), 6);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = CareMapConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("caremap"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
