//! Flattening raw features into [`NormalizedRecord`]s.
//!
//! Missing attributes or geometry never fail a record. They become `None`
//! columns, since the upstream schema is not complete for every crash.

use chrono::{DateTime, NaiveDate};
use crash_map_crash_models::{NormalizedRecord, RawFeature};

use crate::feed::FieldMapping;

/// Maps one raw feature to a normalized record.
#[must_use]
pub fn normalize_feature(feature: &RawFeature, fields: &FieldMapping) -> NormalizedRecord {
    let coordinates = feature.geometry;

    NormalizedRecord {
        crash_id: attribute_string(feature, &fields.crash_id),
        crash_date: feature.attribute(&fields.crash_date).and_then(epoch_ms_to_date),
        severity: attribute_string(feature, &fields.severity),
        collision_type: attribute_string(feature, &fields.collision_type),
        longitude: coordinates.map(|c| c.longitude),
        latitude: coordinates.map(|c| c.latitude),
    }
}

/// Normalizes a whole feed, preserving order.
#[must_use]
pub fn normalize_all(features: Vec<RawFeature>, fields: &FieldMapping) -> Vec<NormalizedRecord> {
    let records: Vec<NormalizedRecord> = features
        .into_iter()
        .map(|feature| normalize_feature(&feature, fields))
        .collect();

    let undated = records.iter().filter(|r| r.crash_date.is_none()).count();
    let unlocated = records.iter().filter(|r| r.longitude.is_none()).count();
    log::info!(
        "Normalized {} records ({undated} without a date, {unlocated} without coordinates)",
        records.len(),
    );

    records
}

/// Reads an attribute as text. Numbers and booleans keep their JSON
/// rendering; blank strings count as missing.
fn attribute_string(feature: &RawFeature, name: &str) -> Option<String> {
    match feature.attribute(name)? {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Converts a Unix epoch timestamp in milliseconds to its UTC calendar date.
///
/// Accepts integer or floating JSON numbers and numeric strings. Returns
/// `None` for anything else, including values chrono cannot represent.
#[must_use]
pub fn epoch_ms_to_date(value: &serde_json::Value) -> Option<NaiveDate> {
    let millis = match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_millis)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_millis))
        }
        _ => None,
    }?;

    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

#[allow(clippy::cast_possible_truncation)]
fn float_millis(ms: f64) -> Option<i64> {
    // Out-of-range floats saturate, which chrono then rejects.
    ms.is_finite().then(|| ms.floor() as i64)
}
