//! Error types and handling for `CareMap`

use thiserror::Error;

/// Main error type for the `CareMap` backend
#[derive(Error, Debug)]
pub enum CareMapError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Raw or normalized dataset could not be read or parsed
    #[error("Dataset error: {message}")]
    Dataset { message: String },

    /// Upstream (assistant or asset origin) communication errors
    #[error("Upstream error: {message}")]
    Upstream { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Offline cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON encoding/decoding errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl CareMapError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new dataset error
    pub fn dataset<S: Into<String>>(message: S) -> Self {
        Self::Dataset {
            message: message.into(),
        }
    }

    /// Create a new upstream error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            CareMapError::Config { .. } => {
                "Configuration error. Please check your config file and environment.".to_string()
            }
            CareMapError::Dataset { message } => {
                format!("Clinic dataset could not be processed: {message}")
            }
            CareMapError::Upstream { .. } => {
                "Unable to reach an external service. Please try again later.".to_string()
            }
            CareMapError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            CareMapError::Cache { .. } => {
                "Offline cache operation failed. You may need to clear the cache directory."
                    .to_string()
            }
            CareMapError::Io { .. } => {
                "File operation failed. Please check file paths and permissions.".to_string()
            }
            CareMapError::Json { .. } => "Malformed JSON data.".to_string(),
        }
    }
}
