//! Deserialization helpers for loosely-typed fields.
//!
//! Source data mixes strings, numbers and nulls for the same column (zip codes
//! as numbers, coordinates as strings). These helpers accept any of those
//! shapes and never fail on an unexpected scalar.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Str(String),
    Num(serde_json::Number),
    Bool(bool),
}

impl Loose {
    fn into_text(self) -> String {
        match self {
            Loose::Str(s) => s,
            Loose::Num(n) => n.to_string(),
            Loose::Bool(b) => b.to_string(),
        }
    }
}

/// Parse a coordinate, returning `None` for anything that is not a finite
/// number.
#[must_use]
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Optional text; blank values are absent.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Loose>::deserialize(deserializer)?
        .map(|v| v.into_text().trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Required text; absent or null becomes the empty string.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string(deserializer)?.unwrap_or_default())
}

/// Optional coordinate; malformed values are absent rather than an error.
pub fn opt_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Num(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Loose::Str(s)) => parse_coordinate(&s),
        Some(Loose::Bool(_)) | None => None,
    })
}
