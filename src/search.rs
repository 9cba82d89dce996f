//! Clinic search and facet filtering
//!
//! A query selects the clinics that satisfy all three predicates:
//! - the free-text term is contained in the city (case-insensitive) or in the zip
//! - the service facet is contained in the joined services text
//! - the insurance facet is contained in the joined insurance/cost text
//!
//! Each predicate holds vacuously when its input is empty. Results are a
//! stable subsequence of the input; nothing is re-sorted.

use crate::models::{ClinicRecord, SearchQuery};

/// A query compiled once for repeated matching.
#[derive(Debug, Clone)]
pub struct ClinicMatcher {
    text: String,
    service: String,
    insurance: String,
}

impl ClinicMatcher {
    #[must_use]
    pub fn new(query: &SearchQuery) -> Self {
        Self {
            text: query.text.trim().to_lowercase(),
            service: query.service.trim().to_lowercase(),
            insurance: query.insurance.trim().to_lowercase(),
        }
    }

    #[must_use]
    pub fn matches(&self, clinic: &ClinicRecord) -> bool {
        self.matches_location(clinic) && self.matches_service(clinic) && self.matches_insurance(clinic)
    }

    fn matches_location(&self, clinic: &ClinicRecord) -> bool {
        if self.text.is_empty() {
            return true;
        }
        let in_city = clinic
            .city
            .as_deref()
            .is_some_and(|city| city.to_lowercase().contains(&self.text));
        // Zips are compared as stored.
        let in_zip = clinic
            .zip
            .as_deref()
            .is_some_and(|zip| zip.contains(&self.text));
        in_city || in_zip
    }

    fn matches_service(&self, clinic: &ClinicRecord) -> bool {
        self.service.is_empty() || clinic.services_text().to_lowercase().contains(&self.service)
    }

    fn matches_insurance(&self, clinic: &ClinicRecord) -> bool {
        self.insurance.is_empty()
            || clinic.insurance_text().to_lowercase().contains(&self.insurance)
    }
}

/// Filter `clinics` by `query`, preserving relative order.
#[must_use]
pub fn search<'a>(clinics: &'a [ClinicRecord], query: &SearchQuery) -> Vec<&'a ClinicRecord> {
    if query.is_empty() {
        return clinics.iter().collect();
    }
    let matcher = ClinicMatcher::new(query);
    clinics.iter().filter(|c| matcher.matches(c)).collect()
}

/// Like [`search`], returning owned records.
#[must_use]
pub fn search_owned(clinics: &[ClinicRecord], query: &SearchQuery) -> Vec<ClinicRecord> {
    search(clinics, query).into_iter().cloned().collect()
}
