//! Search query model

use serde::{Deserialize, Serialize};

/// Free-text term plus the two optional facets. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Matched against city and zip
    #[serde(default, rename = "q", alias = "text")]
    pub text: String,
    /// Service facet
    #[serde(default)]
    pub service: String,
    /// Insurance/cost facet
    #[serde(default, alias = "cost")]
    pub insurance: String,
}

impl SearchQuery {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    #[must_use]
    pub fn with_insurance(mut self, insurance: impl Into<String>) -> Self {
        self.insurance = insurance.into();
        self
    }

    /// True when no field would filter anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
            && self.service.trim().is_empty()
            && self.insurance.trim().is_empty()
    }
}
