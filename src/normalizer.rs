//! Dataset Normalizer
//!
//! Turns the raw HRSA health-center site export (JSON array or CSV) into the
//! simplified clinic list served by the directory. Records are filtered to a
//! single region and mapped field by field; coordinates that do not parse are
//! dropped from the record but the record itself is kept.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::{ClinicRecord, TextField, lenient};
use crate::{CareMapError, Result};

const SLIDING_SCALE: &str = "Sliding Scale (based on income)";

/// One row of the raw government dataset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSiteRecord {
    #[serde(rename = "Site Name", default, deserialize_with = "lenient::opt_string")]
    pub site_name: Option<String>,
    #[serde(rename = "Site Address", default, deserialize_with = "lenient::opt_string")]
    pub site_address: Option<String>,
    #[serde(rename = "Site City", default, deserialize_with = "lenient::opt_string")]
    pub site_city: Option<String>,
    #[serde(
        rename = "Site State Abbreviation",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub site_state: Option<String>,
    #[serde(rename = "Site Postal Code", default, deserialize_with = "lenient::opt_string")]
    pub site_postal_code: Option<String>,
    #[serde(
        rename = "Site Telephone Number",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub site_phone: Option<String>,
    #[serde(rename = "Site Web Address", default, deserialize_with = "lenient::opt_string")]
    pub site_web_address: Option<String>,
    #[serde(
        rename = "Site Status Description",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub site_status: Option<String>,
    #[serde(
        rename = "Geocoding Artifact Address Primary Y Coordinate",
        default,
        deserialize_with = "lenient::opt_coordinate"
    )]
    pub latitude: Option<f64>,
    #[serde(
        rename = "Geocoding Artifact Address Primary X Coordinate",
        default,
        deserialize_with = "lenient::opt_coordinate"
    )]
    pub longitude: Option<f64>,
    #[serde(rename = "Health Center Type", default, deserialize_with = "lenient::opt_string")]
    pub center_type: Option<String>,
    #[serde(
        rename = "Health Center Organization Name",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub organization: Option<String>,
    #[serde(
        rename = "Health Center Location Type Description",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub location_type: Option<String>,
    #[serde(
        rename = "Health Center Operator Description",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub operator: Option<String>,
    #[serde(
        rename = "Health Center Service Delivery Site Location Setting Description",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub setting: Option<String>,
    #[serde(
        rename = "Operating Hours per Week",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub hours_per_week: Option<String>,
}

/// Normalizer settings
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// State abbreviation to keep
    pub region: String,
    /// Keep only sites whose status is `Active`
    pub active_only: bool,
    /// Derive the cost facet from the center type
    pub infer_cost: bool,
    /// Derive the service facet from the site setting
    pub infer_services: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            region: "TX".to_string(),
            active_only: false,
            infer_cost: true,
            infer_services: true,
        }
    }
}

impl NormalizeOptions {
    #[must_use]
    pub fn for_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a normalizer run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    pub read: usize,
    pub written: usize,
    pub unmappable: usize,
    pub output: PathBuf,
}

/// Service category for a site setting description. First match wins.
#[must_use]
pub fn service_category(setting: &str) -> &'static str {
    let setting = setting.to_lowercase();
    if setting.contains("dental") {
        "Dental"
    } else if setting.contains("mental") || setting.contains("behavioral") {
        "Behavioral Health"
    } else if setting.contains("women") {
        "Women's Health"
    } else if setting.contains("primary") {
        "Primary Care"
    } else if setting.contains("clinic") {
        "General Clinic"
    } else {
        "Other"
    }
}

/// ZIP+4 codes are cut to the five-digit zip; string codes are kept whole.
fn five_digit_zip(zip: String) -> String {
    match zip.get(..5) {
        Some(head) if zip.len() > 5 && head.bytes().all(|b| b.is_ascii_digit()) => {
            head.to_string()
        }
        _ => zip,
    }
}

/// Exports carry the literal string `nan` for empty cells.
fn clean(value: Option<&String>) -> Option<String> {
    value
        .filter(|v| !v.eq_ignore_ascii_case("nan"))
        .cloned()
}

impl RawSiteRecord {
    fn in_region(&self, region: &str) -> bool {
        self.site_state
            .as_deref()
            .is_some_and(|state| state.trim().eq_ignore_ascii_case(region.trim()))
    }

    fn is_active(&self) -> bool {
        self.site_status.as_deref() == Some("Active")
    }

    fn offers_sliding_scale(&self) -> bool {
        self.center_type.as_deref() == Some("Federally Qualified Health Center (FQHC)")
            || self.location_type.as_deref() == Some("Mobile Van")
            || self.operator.as_deref() == Some("Health Center/Applicant")
    }

    fn services(&self, options: &NormalizeOptions) -> Option<TextField> {
        let setting = clean(self.setting.as_ref());
        match setting {
            Some(setting) if options.infer_services => Some(service_category(&setting).into()),
            _ => clean(self.center_type.as_ref()).map(TextField::Single),
        }
    }

    /// Map the verbose source fields onto a clinic record
    #[must_use]
    pub fn to_clinic(&self, options: &NormalizeOptions) -> ClinicRecord {
        let insurance_payment = (options.infer_cost && self.offers_sliding_scale())
            .then(|| TextField::from(SLIDING_SCALE));

        ClinicRecord {
            name: clean(self.site_name.as_ref()).unwrap_or_default(),
            address: clean(self.site_address.as_ref()).unwrap_or_default(),
            city: clean(self.site_city.as_ref()),
            state: clean(self.site_state.as_ref()),
            zip: clean(self.site_postal_code.as_ref()).map(five_digit_zip),
            phone: clean(self.site_phone.as_ref()),
            lat: self.latitude,
            lng: self.longitude,
            services: self.services(options),
            insurance_payment,
            hours_label: clean(self.hours_per_week.as_ref()).map(|h| format!("{h} hours/week")),
            website: clean(self.site_web_address.as_ref()),
            organization: clean(self.organization.as_ref()),
        }
    }
}

/// Filter raw records to the configured region and map them to clinics.
/// Order is preserved and no deduplication takes place.
#[must_use]
pub fn normalize(records: &[RawSiteRecord], options: &NormalizeOptions) -> Vec<ClinicRecord> {
    records
        .iter()
        .filter(|r| r.in_region(&options.region))
        .filter(|r| !options.active_only || r.is_active())
        .map(|r| r.to_clinic(options))
        .collect()
}

/// Read the raw dataset. `.csv` files are read as CSV with a header row,
/// anything else as a JSON array of objects.
pub fn read_raw(path: impl AsRef<Path>) -> Result<Vec<RawSiteRecord>> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        read_csv(path)
    } else {
        read_json(path)
    }
}

fn read_json(path: &Path) -> Result<Vec<RawSiteRecord>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        CareMapError::dataset(format!("Failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        CareMapError::dataset(format!(
            "{} is not a JSON array of site records: {e}",
            path.display()
        ))
    })
}

fn read_csv(path: &Path) -> Result<Vec<RawSiteRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        CareMapError::dataset(format!("Failed to open {}: {e}", path.display()))
    })?;
    let headers = reader
        .headers()
        .map_err(|e| CareMapError::dataset(format!("Failed to read CSV header: {e}")))?
        .clone();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            CareMapError::dataset(format!("Malformed CSV row {}: {e}", line + 2))
        })?;
        // Every cell stays a string so zip codes keep their leading zeros.
        let object: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        let record = serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            CareMapError::dataset(format!("Malformed CSV row {}: {e}", line + 2))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write the clinic list as pretty JSON. The file is written next to the
/// target and renamed into place, so readers never see partial output.
pub fn write_clinics(path: impl AsRef<Path>, clinics: &[ClinicRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(clinics)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json)?;
    fs::rename(&staging, path)?;
    Ok(())
}

/// Read, normalize and persist in one step. Nothing is written when the
/// input cannot be parsed.
pub fn run(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &NormalizeOptions,
) -> Result<NormalizeReport> {
    let input = input.as_ref();
    let output = output.as_ref();
    info!(
        "Normalizing {} for region {}",
        input.display(),
        options.region
    );

    let raw = read_raw(input)?;
    debug!("Read {} raw site records", raw.len());

    let clinics = normalize(&raw, options);
    let unmappable = clinics.iter().filter(|c| !c.is_mappable()).count();
    if unmappable > 0 {
        warn!("{} clinics have no usable coordinates", unmappable);
    }
    if clinics.is_empty() {
        warn!("No records matched region {}", options.region);
    }

    write_clinics(output, &clinics)?;
    info!("Saved {} clinics to {}", clinics.len(), output.display());

    Ok(NormalizeReport {
        read: raw.len(),
        written: clinics.len(),
        unmappable,
        output: output.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    const RAW_JSON: &str = r#"[
        {
            "Site Name": "Austin Community Clinic",
            "Site Address": "1210 Rosewood Ave",
            "Site City": "Austin",
            "Site State Abbreviation": "TX",
            "Site Postal Code": "78702",
            "Site Telephone Number": "512-978-9015",
            "Site Web Address": "www.communitycaretx.org",
            "Site Status Description": "Active",
            "Geocoding Artifact Address Primary Y Coordinate": 30.2695,
            "Geocoding Artifact Address Primary X Coordinate": "-97.7224",
            "Health Center Type": "Federally Qualified Health Center (FQHC)",
            "Health Center Organization Name": "CommUnityCare",
            "Operating Hours per Week": 40
        },
        {
            "Site Name": "Sacramento Site",
            "Site Address": "1 Capitol Mall",
            "Site City": "Sacramento",
            "Site State Abbreviation": "CA",
            "Geocoding Artifact Address Primary Y Coordinate": 38.5,
            "Geocoding Artifact Address Primary X Coordinate": -121.4
        },
        {
            "Site Name": "El Paso Mobile",
            "Site Address": "nan",
            "Site City": "El Paso",
            "Site State Abbreviation": "tx",
            "Site Status Description": "Inactive",
            "Geocoding Artifact Address Primary Y Coordinate": "not-a-number",
            "Health Center Type": "Health Center Program Look-Alike",
            "Health Center Location Type Description": "Mobile Van"
        }
    ]"#;

    fn raw_records() -> Vec<RawSiteRecord> {
        serde_json::from_str(RAW_JSON).unwrap()
    }

    #[test]
    fn test_filters_by_region_and_preserves_order() {
        let clinics = normalize(&raw_records(), &NormalizeOptions::for_region("TX"));
        let names: Vec<&str> = clinics.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Austin Community Clinic", "El Paso Mobile"]);

        let clinics = normalize(&raw_records(), &NormalizeOptions::for_region("CA"));
        assert_eq!(clinics.len(), 1);
    }

    #[test]
    fn test_field_mapping() {
        let clinics = normalize(&raw_records(), &NormalizeOptions::default());
        let austin = &clinics[0];

        assert_eq!(austin.address, "1210 Rosewood Ave");
        assert_eq!(austin.city.as_deref(), Some("Austin"));
        assert_eq!(austin.zip.as_deref(), Some("78702"));
        assert_eq!(austin.phone.as_deref(), Some("512-978-9015"));
        assert_eq!(austin.website.as_deref(), Some("www.communitycaretx.org"));
        assert_eq!(austin.organization.as_deref(), Some("CommUnityCare"));
        assert_eq!(austin.coordinates(), Some((30.2695, -97.7224)));
        assert_eq!(austin.hours_label.as_deref(), Some("40 hours/week"));
        assert_eq!(
            austin.services_text(),
            "Federally Qualified Health Center (FQHC)"
        );
        assert_eq!(austin.insurance_text(), SLIDING_SCALE);
    }

    #[test]
    fn test_bad_coordinates_keep_the_record() {
        let clinics = normalize(&raw_records(), &NormalizeOptions::default());
        let el_paso = &clinics[1];

        assert!(el_paso.lat.is_none());
        assert!(el_paso.lng.is_none());
        assert!(!el_paso.is_mappable());
        // "nan" cells are absent, but the mandatory field stays present.
        assert_eq!(el_paso.address, "");
        // Mobile vans are sliding scale.
        assert_eq!(el_paso.insurance_text(), SLIDING_SCALE);
    }

    #[test]
    fn test_active_only_and_cost_inference_toggles() {
        let options = NormalizeOptions {
            active_only: true,
            infer_cost: false,
            ..NormalizeOptions::default()
        };
        let clinics = normalize(&raw_records(), &options);
        assert_eq!(clinics.len(), 1);
        assert!(clinics[0].insurance_payment.is_none());
    }

    #[rstest]
    #[case("Dental Clinic", "Dental")]
    #[case("Mental Health Facility", "Behavioral Health")]
    #[case("Behavioral health outpatient", "Behavioral Health")]
    #[case("Women's Health Center", "Women's Health")]
    #[case("Primary Care Office", "Primary Care")]
    #[case("School-based clinic", "General Clinic")]
    #[case("Homeless shelter", "Other")]
    fn test_service_category(#[case] setting: &str, #[case] expected: &str) {
        assert_eq!(service_category(setting), expected);
    }

    #[test]
    fn test_services_follow_setting_when_present() {
        let record = RawSiteRecord {
            site_state: Some("TX".to_string()),
            center_type: Some("Federally Qualified Health Center (FQHC)".to_string()),
            setting: Some("Dental Clinic".to_string()),
            ..RawSiteRecord::default()
        };

        let clinic = record.to_clinic(&NormalizeOptions::default());
        assert_eq!(clinic.services_text(), "Dental");

        let options = NormalizeOptions {
            infer_services: false,
            ..NormalizeOptions::default()
        };
        let clinic = record.to_clinic(&options);
        assert_eq!(
            clinic.services_text(),
            "Federally Qualified Health Center (FQHC)"
        );
    }

    #[rstest]
    #[case("78702-1234", "78702")]
    #[case("787021234", "78702")]
    #[case("07102", "07102")]
    #[case("TX-MOBILE", "TX-MOBILE")]
    fn test_zip_is_cut_to_five_digits(#[case] raw: &str, #[case] expected: &str) {
        let record = RawSiteRecord {
            site_postal_code: Some(raw.to_string()),
            ..RawSiteRecord::default()
        };
        let clinic = record.to_clinic(&NormalizeOptions::default());
        assert_eq!(clinic.zip.as_deref(), Some(expected));
    }

    #[test]
    fn test_csv_keeps_leading_zeros() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("sites.csv");
        fs::write(
            &input,
            "Site Name,Site Address,Site City,Site State Abbreviation,Site Postal Code,\
Geocoding Artifact Address Primary Y Coordinate,Geocoding Artifact Address Primary X Coordinate\n\
Newark Health,1 Broad St,Newark,NJ,07102,40.73,-74.17\n\
Austin Clinic,2 Main St,Austin,TX,78701,,\n",
        )
        .unwrap();

        let raw = read_raw(&input).unwrap();
        assert_eq!(raw.len(), 2);

        let clinics = normalize(&raw, &NormalizeOptions::for_region("NJ"));
        assert_eq!(clinics[0].zip.as_deref(), Some("07102"));
        assert_eq!(clinics[0].coordinates(), Some((40.73, -74.17)));

        let clinics = normalize(&raw, &NormalizeOptions::for_region("TX"));
        assert!(!clinics[0].is_mappable());
    }

    #[test]
    fn test_run_writes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("hrsa_full.json");
        let output = dir.path().join("data").join("clinics.json");
        fs::write(&input, RAW_JSON).unwrap();

        let report = run(&input, &output, &NormalizeOptions::default()).unwrap();
        assert_eq!(report.read, 3);
        assert_eq!(report.written, 2);
        assert_eq!(report.unmappable, 1);

        let written: Vec<ClinicRecord> =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written, normalize(&raw_records(), &NormalizeOptions::default()));
        assert!(!output.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_malformed_input_aborts_without_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("hrsa_full.json");
        let output = dir.path().join("clinics.json");
        fs::write(&input, r#"{"Site Name": "not an array"}"#).unwrap();

        let err = run(&input, &output, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, CareMapError::Dataset { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = read_raw(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CareMapError::Dataset { .. }));
    }
}
