//! Config-driven feed definition.
//!
//! A [`FeedDefinition`] captures everything needed to query one `ArcGIS`
//! feature-service layer: the query URL, the API's page cap, the date window,
//! and which attribute names feed which record columns. The default Virginia
//! crash feed is baked into the binary from `feeds/va_crashes.toml`.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::SourceError;

/// Embedded default feed definition.
const DEFAULT_FEED_TOML: &str = include_str!("../feeds/va_crashes.toml");

/// Hard page cap of the default crash feed service.
pub const DEFAULT_PAGE_SIZE: u64 = 2000;

/// Per-request timeout applied when the feed does not set one.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// A complete description of one paginated feature-service query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDefinition {
    /// Unique identifier (e.g., `"va_crashes_2024"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The layer's `/query` endpoint.
    pub query_url: String,
    /// Maximum features the API returns per request.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Value of the `outFields` parameter.
    #[serde(default = "default_out_fields")]
    pub out_fields: String,
    /// Attribute used in the date-range filter.
    #[serde(default = "default_date_column")]
    pub date_column: String,
    /// First day of the date range (inclusive).
    pub start_date: NaiveDate,
    /// Last day of the date range (inclusive).
    pub end_date: NaiveDate,
    /// Per-request timeout in seconds. Timeouts count as transport failures.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Source attribute names for each normalized column.
    #[serde(default)]
    pub fields: FieldMapping,
}

/// Attribute names copied into each [`NormalizedRecord`] column.
///
/// [`NormalizedRecord`]: crash_map_crash_models::NormalizedRecord
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Attribute holding the crash identifier.
    pub crash_id: String,
    /// Attribute holding the epoch-millisecond crash timestamp.
    pub crash_date: String,
    /// Attribute holding the severity code.
    pub severity: String,
    /// Attribute holding the collision type.
    pub collision_type: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            crash_id: "DOCUMENT_NBR".to_string(),
            crash_date: "CRASH_DT".to_string(),
            severity: "CRASH_SEVERITY".to_string(),
            collision_type: "COLLISION_TYPE".to_string(),
        }
    }
}

const fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_out_fields() -> String {
    "*".to_string()
}

fn default_date_column() -> String {
    "CRASH_DT".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl FeedDefinition {
    /// Builds the `where` filter for the configured date range.
    #[must_use]
    pub fn where_clause(&self) -> String {
        format!(
            "{col} >= '{start}' AND {col} <= '{end}'",
            col = self.date_column,
            start = self.start_date.format("%Y-%m-%d"),
            end = self.end_date.format("%Y-%m-%d"),
        )
    }

    /// Query parameters shared by every page request. The offset is added
    /// per request.
    #[must_use]
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("where", self.where_clause()),
            ("outFields", self.out_fields.clone()),
            ("f", "geojson".to_string()),
            ("outSR", "4326".to_string()),
            ("returnGeometry", "true".to_string()),
            ("resultRecordCount", self.page_size.to_string()),
        ]
    }

    /// Checks that the definition can drive a retrieval.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the page size is zero, the date
    /// range is inverted, or the query URL is empty.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.query_url.trim().is_empty() {
            return Err(SourceError::Config {
                message: format!("{}: query_url is empty", self.id),
            });
        }
        if self.page_size == 0 {
            return Err(SourceError::Config {
                message: format!("{}: page_size must be greater than zero", self.id),
            });
        }
        if self.start_date > self.end_date {
            return Err(SourceError::Config {
                message: format!(
                    "{}: start_date {} is after end_date {}",
                    self.id, self.start_date, self.end_date
                ),
            });
        }
        Ok(())
    }
}

/// Parses and validates a TOML feed definition.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the TOML is malformed or the
/// definition fails validation.
pub fn parse_feed_toml(toml_str: &str) -> Result<FeedDefinition, SourceError> {
    let feed: FeedDefinition =
        toml::de::from_str(toml_str).map_err(|e| SourceError::Config {
            message: e.to_string(),
        })?;
    feed.validate()?;
    Ok(feed)
}

/// Returns the embedded default crash feed.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the embedded definition is invalid.
pub fn default_feed() -> Result<FeedDefinition, SourceError> {
    parse_feed_toml(DEFAULT_FEED_TOML)
}

/// Loads a feed definition from a TOML file on disk.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read or parsed.
pub fn load_feed(path: &Path) -> Result<FeedDefinition, SourceError> {
    let contents = std::fs::read_to_string(path)?;
    log::debug!("Loaded feed definition from {}", path.display());
    parse_feed_toml(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_feed_parses() {
        let feed = default_feed().unwrap();
        assert_eq!(feed.id, "va_crashes_2024");
        assert_eq!(feed.page_size, 2000);
        assert_eq!(feed.fields, FieldMapping::default());
        assert_eq!(feed.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn builds_date_range_filter() {
        let feed = default_feed().unwrap();
        assert_eq!(
            feed.where_clause(),
            "CRASH_DT >= '2024-01-01' AND CRASH_DT <= '2024-12-31'"
        );
        let params = feed.query_params();
        assert!(params.contains(&("f", "geojson".to_string())));
        assert!(params.contains(&("resultRecordCount", "2000".to_string())));
    }

    #[test]
    fn applies_defaults_for_optional_keys() {
        let feed = parse_feed_toml(
            r#"
            id = "minimal"
            name = "Minimal"
            query_url = "https://example.com/FeatureServer/0/query"
            start_date = "2023-06-01"
            end_date = "2023-06-30"
            "#,
        )
        .unwrap();
        assert_eq!(feed.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(feed.out_fields, "*");
        assert_eq!(feed.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(feed.fields.collision_type, "COLLISION_TYPE");
    }

    #[test]
    fn rejects_zero_page_size() {
        let result = parse_feed_toml(
            r#"
            id = "broken"
            name = "Broken"
            query_url = "https://example.com/query"
            page_size = 0
            start_date = "2024-01-01"
            end_date = "2024-12-31"
            "#,
        );
        assert!(matches!(result, Err(SourceError::Config { .. })));
    }

    #[test]
    fn rejects_inverted_date_range() {
        let mut feed = default_feed().unwrap();
        feed.start_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(feed.validate(), Err(SourceError::Config { .. })));
    }
}
