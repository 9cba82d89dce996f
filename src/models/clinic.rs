//! Clinic record model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::lenient;

/// Separator used when a multi-valued field is flattened to text.
pub const JOIN_SEPARATOR: &str = ", ";

/// Free-text field that arrives either as one string or as an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Single(String),
    Multiple(Vec<String>),
}

impl TextField {
    /// Canonical text form used for matching and display. List entries are
    /// joined, so a term spanning two entries is not a substring of any one.
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            TextField::Single(s) => s.clone(),
            TextField::Multiple(items) => items.join(JOIN_SEPARATOR),
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl From<&str> for TextField {
    fn from(value: &str) -> Self {
        TextField::Single(value.to_string())
    }
}

impl From<Vec<&str>> for TextField {
    fn from(values: Vec<&str>) -> Self {
        TextField::Multiple(values.into_iter().map(str::to_string).collect())
    }
}

/// One care site's contact, location and offering metadata.
///
/// Only `name` and `address` are always present; every other field is
/// treated as absent when missing or blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub address: String,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub city: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<String>,
    /// Kept as text: may carry formatting such as `78701-1234`.
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub zip: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_coordinate",
        skip_serializing_if = "Option::is_none"
    )]
    pub lat: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_coordinate",
        skip_serializing_if = "Option::is_none"
    )]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<TextField>,
    #[serde(default, alias = "cost", skip_serializing_if = "Option::is_none")]
    pub insurance_payment: Option<TextField>,
    #[serde(
        default,
        alias = "hours",
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub hours_label: Option<String>,
    /// Stored without scheme prefix.
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub website: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub organization: Option<String>,
}

impl ClinicRecord {
    /// Create a record with only the mandatory fields set
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Self::default()
        }
    }

    /// `(lat, lng)` when both are present and finite; otherwise the record
    /// is not mappable.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_mappable(&self) -> bool {
        self.coordinates().is_some()
    }

    /// Joined services text, empty when absent
    #[must_use]
    pub fn services_text(&self) -> String {
        self.services.as_ref().map(TextField::joined).unwrap_or_default()
    }

    /// Joined insurance/cost text, empty when absent
    #[must_use]
    pub fn insurance_text(&self) -> String {
        self.insurance_payment
            .as_ref()
            .map(TextField::joined)
            .unwrap_or_default()
    }

    /// Website as a browsable link
    #[must_use]
    pub fn website_url(&self) -> Option<String> {
        self.website.as_ref().map(|w| {
            if w.starts_with("http://") || w.starts_with("https://") {
                w.clone()
            } else {
                format!("https://{w}")
            }
        })
    }
}
