//! Data models for the CareMap backend
//!
//! This module contains the core domain models organized by concern:
//! - Clinic: normalized clinic records and their free-text fields
//! - Query: search input constructed per user interaction
//! - Lenient: field helpers for loosely-typed source data

pub mod clinic;
pub mod lenient;
pub mod query;

// Re-export all public types for convenient access
pub use clinic::{ClinicRecord, TextField};
pub use query::SearchQuery;
