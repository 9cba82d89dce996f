//! `CareMap` - clinic locator backend and widget logic
//!
//! This library provides the clinic directory and its search engine, the
//! assistant proxy, the map widget's presentation logic and the offline
//! asset cache, plus the HTTP surface that ties them together.

pub mod api;
pub mod assistant;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod offline;
pub mod search;
pub mod web;
pub mod widget;

// Re-export core types for public API
pub use assistant::{AnswerSource, AssistantAnswer, AssistantProxy};
pub use config::CareMapConfig;
pub use directory::ClinicDirectory;
pub use error::CareMapError;
pub use models::{ClinicRecord, SearchQuery, TextField};
pub use offline::{AssetOrigin, AssetResponse, OfflineCache, StaticOrigin};
pub use search::{ClinicMatcher, search};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, CareMapError>;
