//! Clinic Directory
//!
//! Holds the normalized clinic list in memory. The list is read once at
//! startup and never mutated afterwards, so it is shared as an `Arc<[_]>`
//! between request handlers without locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::models::{ClinicRecord, SearchQuery};
use crate::{CareMapError, Result, search};

/// Read-only clinic list
#[derive(Debug, Clone)]
pub struct ClinicDirectory {
    clinics: Arc<[ClinicRecord]>,
    source: Option<PathBuf>,
}

impl ClinicDirectory {
    /// Build a directory from records already in memory
    #[must_use]
    pub fn from_records(records: Vec<ClinicRecord>) -> Self {
        Self {
            clinics: records.into(),
            source: None,
        }
    }

    /// An empty directory
    #[must_use]
    pub fn empty() -> Self {
        Self::from_records(Vec::new())
    }

    /// Load the persisted clinic list, failing on a missing or malformed file
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CareMapError::dataset(format!("Failed to read {}: {e}", path.display()))
        })?;
        let records: Vec<ClinicRecord> = serde_json::from_str(&raw).map_err(|e| {
            CareMapError::dataset(format!("Failed to parse {}: {e}", path.display()))
        })?;

        Ok(Self {
            clinics: records.into(),
            source: Some(path.to_path_buf()),
        })
    }

    /// Load the persisted clinic list. A failure is logged and the directory
    /// starts empty so the server stays reachable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(directory) => {
                info!(
                    "Loaded {} clinics from {}",
                    directory.len(),
                    path.display()
                );
                directory
            }
            Err(e) => {
                error!("Failed to load clinic data, serving an empty list: {}", e);
                Self {
                    clinics: Vec::<ClinicRecord>::new().into(),
                    source: Some(path.to_path_buf()),
                }
            }
        }
    }

    /// The full list
    #[must_use]
    pub fn all(&self) -> Arc<[ClinicRecord]> {
        Arc::clone(&self.clinics)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clinics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clinics.is_empty()
    }

    /// File the directory was loaded from, if any
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Run a search over the loaded list
    #[must_use]
    pub fn search(&self, query: &SearchQuery) -> Vec<ClinicRecord> {
        search::search_owned(&self.clinics, query)
    }
}

impl Default for ClinicDirectory {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_file() {
        let file = write_temp(
            r#"[
                {"name": "A", "address": "1 Main", "city": "Austin", "zip": "78701"},
                {"name": "B", "address": "2 Main", "city": "Dallas"}
            ]"#,
        );

        let directory = ClinicDirectory::load(file.path());
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.all()[0].name, "A");
        assert_eq!(directory.source(), Some(file.path()));
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let directory = ClinicDirectory::load("/definitely/not/here/clinics.json");
        assert!(directory.is_empty());
        assert!(ClinicDirectory::try_load("/definitely/not/here/clinics.json").is_err());
    }

    #[test]
    fn test_malformed_file_degrades_to_empty() {
        let file = write_temp(r#"{"not": "a list"}"#);

        let directory = ClinicDirectory::load(file.path());
        assert!(directory.is_empty());

        let err = ClinicDirectory::try_load(file.path()).unwrap_err();
        assert!(matches!(err, CareMapError::Dataset { .. }));
    }

    #[test]
    fn test_all_shares_the_same_list() {
        let directory = ClinicDirectory::from_records(vec![ClinicRecord::new("A", "1 Main")]);
        let first = directory.all();
        let second = directory.all();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_search_over_directory() {
        let mut austin = ClinicRecord::new("A", "1 Main");
        austin.city = Some("Austin".to_string());
        let directory =
            ClinicDirectory::from_records(vec![austin, ClinicRecord::new("B", "2 Main")]);

        let results = directory.search(&SearchQuery::new("aus"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "A");
        assert_eq!(directory.search(&SearchQuery::default()).len(), 2);
    }
}
