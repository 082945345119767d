#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crash record types shared across the crash map toolchain.
//!
//! Raw features come straight off the feature-service API as an attribute
//! bag plus an optional point geometry. Every downstream consumer (window
//! selection, persistence, CSV export, the map) works on the flat
//! [`NormalizedRecord`] instead.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 point taken from a feature's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Longitude (first element of a `GeoJSON` position).
    pub longitude: f64,
    /// Latitude (second element of a `GeoJSON` position).
    pub latitude: f64,
}

/// One feature exactly as the API returned it.
///
/// Attribute keys are defined by the API and are not guaranteed to be
/// present on every record. A missing key means "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    /// Attribute name to scalar value (string, number, or null).
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Point geometry, if the feature had a usable one.
    pub geometry: Option<Coordinates>,
}

impl RawFeature {
    /// Looks up a single attribute, treating JSON `null` as absent.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }
}

/// The features returned by a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// The `resultOffset` this page was requested with.
    pub offset: u64,
    /// Features in the order the API returned them.
    pub features: Vec<RawFeature>,
    /// The service reported more matching records than it sent
    /// (`exceededTransferLimit`).
    pub exceeded_transfer_limit: bool,
}

impl Page {
    /// Number of features on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the page came back empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A crash flattened to the columns every output uses.
///
/// `longitude` and `latitude` are either both present or both absent since
/// they come from the same geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Police report document number.
    pub crash_id: Option<String>,
    /// UTC calendar date of the crash. `None` when the source timestamp
    /// was missing.
    pub crash_date: Option<NaiveDate>,
    /// KABCO severity code as reported (e.g. `"K"`, `"B"`).
    pub severity: Option<String>,
    /// Collision type description, used as the marker category.
    pub collision_type: Option<String>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
}

impl NormalizedRecord {
    /// Returns the record's point when both coordinates are present.
    #[must_use]
    pub const fn coordinates(&self) -> Option<Coordinates> {
        match (self.longitude, self.latitude) {
            (Some(longitude), Some(latitude)) => Some(Coordinates {
                longitude,
                latitude,
            }),
            _ => None,
        }
    }

    /// Parses the severity code into the KABCO scale, if recognised.
    #[must_use]
    pub fn severity_level(&self) -> Option<Severity> {
        self.severity.as_deref()?.trim().parse().ok()
    }
}

/// KABCO injury severity scale used by state crash reports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Severity {
    /// Fatal injury
    #[strum(serialize = "K")]
    #[serde(rename = "K")]
    Fatal,
    /// Suspected serious injury
    #[strum(serialize = "A")]
    #[serde(rename = "A")]
    SeriousInjury,
    /// Suspected minor injury
    #[strum(serialize = "B")]
    #[serde(rename = "B")]
    MinorInjury,
    /// Possible injury
    #[strum(serialize = "C")]
    #[serde(rename = "C")]
    PossibleInjury,
    /// Property damage only
    #[strum(serialize = "O")]
    #[serde(rename = "O")]
    PropertyDamageOnly,
}

impl Severity {
    /// Human-readable description of the severity level.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fatal => "Fatal injury",
            Self::SeriousInjury => "Serious injury",
            Self::MinorInjury => "Minor injury",
            Self::PossibleInjury => "Possible injury",
            Self::PropertyDamageOnly => "Property damage only",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(longitude: Option<f64>, latitude: Option<f64>) -> NormalizedRecord {
        NormalizedRecord {
            crash_id: Some("241234567".to_string()),
            crash_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            severity: Some("B".to_string()),
            collision_type: Some("1. Rear End".to_string()),
            longitude,
            latitude,
        }
    }

    #[test]
    fn coordinates_require_both_axes() {
        assert!(record(Some(-77.4), None).coordinates().is_none());
        let point = record(Some(-77.4), Some(37.5)).coordinates().unwrap();
        assert!((point.longitude - -77.4).abs() < f64::EPSILON);
        assert!((point.latitude - 37.5).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_kabco_codes() {
        assert_eq!(record(None, None).severity_level(), Some(Severity::MinorInjury));
        assert_eq!("K".parse::<Severity>().unwrap(), Severity::Fatal);
        assert_eq!(Severity::PropertyDamageOnly.as_ref(), "O");
        assert!("Z".parse::<Severity>().is_err());
    }

    #[test]
    fn null_attributes_read_as_absent() {
        let mut feature = RawFeature::default();
        feature
            .attributes
            .insert("CRASH_DT".to_string(), serde_json::Value::Null);
        assert!(feature.attribute("CRASH_DT").is_none());
        assert!(feature.attribute("DOCUMENT_NBR").is_none());
    }
}
