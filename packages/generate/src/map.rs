//! Standalone Leaflet map of the result set.
//!
//! Every record with coordinates becomes a `GeoJSON` point carrying its
//! marker colour and popup HTML. The collection is inlined into a single
//! HTML page that loads Leaflet from a CDN, so the file opens directly in
//! a browser.

use std::fmt::Write as _;
use std::path::Path;

use crash_map_crash_models::{Coordinates, NormalizedRecord};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};

use crate::GenerateError;
use crate::color::{ColorAssignment, FALLBACK_COLOR};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
html, body, #map { height: 100%; margin: 0; }
.legend { position: absolute; bottom: 24px; right: 12px; z-index: 1000; background: #fff;
  padding: 8px 10px; font: 12px sans-serif; border-radius: 4px; max-height: 40%; overflow-y: auto;
  box-shadow: 0 1px 4px rgba(0, 0, 0, 0.3); }
.legend span { display: inline-block; width: 10px; height: 10px; border-radius: 50%; margin-right: 6px; }
</style>
</head>
<body>
<div id="map"></div>
__LEGEND__
<script>
const crashes = __DATA__;
const map = L.map("map").setView([__CENTER_LAT__, __CENTER_LON__], __ZOOM__);
L.tileLayer("https://tile.openstreetmap.org/{z}/{x}/{y}.png", {
  maxZoom: 19,
  attribution: "&copy; OpenStreetMap contributors",
}).addTo(map);
L.geoJSON(crashes, {
  pointToLayer: (feature, latlng) => L.circleMarker(latlng, {
    radius: __RADIUS__,
    color: feature.properties.color,
    fill: true,
    fillColor: feature.properties.color,
    fillOpacity: __FILL_OPACITY__,
  }),
  onEachFeature: (feature, layer) => layer.bindPopup(feature.properties.popup, { maxWidth: 300 }),
}).addTo(map);
</script>
</body>
</html>
"#;

/// Presentation settings for the map page.
#[derive(Debug, Clone)]
pub struct MapOptions {
    /// Page title.
    pub title: String,
    /// Initial zoom level.
    pub zoom: u8,
    /// Marker radius in pixels.
    pub radius: u32,
    /// Marker fill opacity (0.0 to 1.0).
    pub fill_opacity: f64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            title: "Crash Map".to_string(),
            zoom: 12,
            radius: 6,
            fill_opacity: 0.7,
        }
    }
}

/// A rendered page plus what went into it.
#[derive(Debug, Clone)]
pub struct RenderedMap {
    /// The complete HTML document.
    pub html: String,
    /// Number of markers placed.
    pub plotted: usize,
    /// Mean of the plotted coordinates.
    pub center: Coordinates,
}

/// Renders the map page, or `None` if no record has coordinates.
///
/// # Errors
///
/// Returns [`GenerateError::Json`] if the marker collection cannot be
/// serialized.
pub fn render_map(
    records: &[NormalizedRecord],
    colors: &ColorAssignment,
    options: &MapOptions,
) -> Result<Option<RenderedMap>, GenerateError> {
    let plotted: Vec<(&NormalizedRecord, Coordinates)> = records
        .iter()
        .filter_map(|r| r.coordinates().map(|c| (r, c)))
        .collect();

    let Some(center) = mean_center(plotted.iter().map(|(_, c)| *c)) else {
        return Ok(None);
    };

    let collection = FeatureCollection {
        bbox: None,
        features: plotted
            .iter()
            .map(|(record, point)| marker_feature(record, *point, colors))
            .collect(),
        foreign_members: None,
    };

    // Keep `</script>` inside string values from closing the script block.
    let data = serde_json::to_string(&collection)?.replace("</", "<\\/");

    let html = fill_template(
        TEMPLATE,
        &[
            ("__TITLE__", escape_html(&options.title)),
            ("__LEGEND__", legend_html(colors)),
            ("__DATA__", data),
            ("__CENTER_LAT__", center.latitude.to_string()),
            ("__CENTER_LON__", center.longitude.to_string()),
            ("__ZOOM__", options.zoom.to_string()),
            ("__RADIUS__", options.radius.to_string()),
            ("__FILL_OPACITY__", options.fill_opacity.to_string()),
        ],
    );

    Ok(Some(RenderedMap {
        html,
        plotted: plotted.len(),
        center,
    }))
}

/// Renders the map and writes it to `path`. Nothing is written when no
/// record has coordinates.
///
/// # Errors
///
/// Returns [`GenerateError`] if rendering or the file write fails.
pub fn write_map(
    path: &Path,
    records: &[NormalizedRecord],
    colors: &ColorAssignment,
    options: &MapOptions,
) -> Result<Option<RenderedMap>, GenerateError> {
    let Some(map) = render_map(records, colors, options)? else {
        log::warn!("No records with coordinates, skipping map {}", path.display());
        return Ok(None);
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &map.html)?;
    log::info!(
        "Map saved: {} ({} markers, {} without coordinates)",
        path.display(),
        map.plotted,
        records.len() - map.plotted,
    );

    Ok(Some(map))
}

/// Arithmetic mean of the points, or `None` for an empty set.
#[must_use]
pub fn mean_center(points: impl IntoIterator<Item = Coordinates>) -> Option<Coordinates> {
    let (count, lon_sum, lat_sum) = points
        .into_iter()
        .fold((0_u32, 0.0_f64, 0.0_f64), |(n, lon, lat), p| {
            (n + 1, lon + p.longitude, lat + p.latitude)
        });
    if count == 0 {
        return None;
    }
    let n = f64::from(count);
    Some(Coordinates {
        longitude: lon_sum / n,
        latitude: lat_sum / n,
    })
}

fn marker_feature(
    record: &NormalizedRecord,
    point: Coordinates,
    colors: &ColorAssignment,
) -> Feature {
    let color = colors.color_for(record.collision_type.as_deref());

    let mut properties = JsonObject::new();
    properties.insert("crash_id".to_string(), record.crash_id.clone().into());
    properties.insert(
        "crash_date".to_string(),
        record.crash_date.map(|d| d.to_string()).into(),
    );
    properties.insert("severity".to_string(), record.severity.clone().into());
    properties.insert(
        "severity_label".to_string(),
        record.severity_level().map(|s| s.label()).into(),
    );
    properties.insert(
        "collision_type".to_string(),
        record.collision_type.clone().into(),
    );
    properties.insert("color".to_string(), color.into());
    properties.insert("popup".to_string(), popup_html(record).into());

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::Point(vec![
            point.longitude,
            point.latitude,
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Popup body for one marker. Missing values show as `N/A`.
#[must_use]
pub fn popup_html(record: &NormalizedRecord) -> String {
    let or_na = |value: Option<String>| value.map_or_else(|| "N/A".to_string(), |v| escape_html(&v));

    let severity = record.severity.as_ref().map(|code| {
        record
            .severity_level()
            .map_or_else(|| code.clone(), |level| format!("{code} ({})", level.label()))
    });

    format!(
        "<b>Crash ID:</b> {}<br>\
         <b>Crash Date:</b> {}<br>\
         <b>Severity:</b> {}<br>\
         <b>Collision Type:</b> {}<br>",
        or_na(record.crash_id.clone()),
        or_na(record.crash_date.map(|d| d.to_string())),
        or_na(severity),
        or_na(record.collision_type.clone()),
    )
}

/// Substitutes every placeholder in one left-to-right pass over `template`.
/// Inserted values are never scanned, so feed text that happens to look
/// like a placeholder stays as it is.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some((start, name, value)) = values
        .iter()
        .filter_map(|(name, value)| rest.find(name).map(|start| (start, *name, value)))
        .min_by_key(|(start, _, _)| *start)
    {
        out.push_str(&rest[..start]);
        out.push_str(value);
        rest = &rest[start + name.len()..];
    }

    out.push_str(rest);
    out
}

fn legend_html(colors: &ColorAssignment) -> String {
    let mut html = String::from("<div class=\"legend\"><b>Collision Type</b><br>\n");
    for category in colors.categories() {
        let _ = writeln!(
            html,
            "<span style=\"background:{}\"></span>{}<br>",
            colors.color_for(Some(category)),
            escape_html(category)
        );
    }
    let _ = writeln!(
        html,
        "<span style=\"background:{FALLBACK_COLOR}\"></span>Other / unknown<br>"
    );
    html.push_str("</div>");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(
        id: &str,
        collision_type: Option<&str>,
        point: Option<(f64, f64)>,
    ) -> NormalizedRecord {
        NormalizedRecord {
            crash_id: Some(id.to_string()),
            crash_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            severity: Some("K".to_string()),
            collision_type: collision_type.map(str::to_string),
            longitude: point.map(|p| p.0),
            latitude: point.map(|p| p.1),
        }
    }

    #[test]
    fn centers_on_mean_of_plotted_points() {
        let records = vec![
            record("1", Some("Angle"), Some((-77.0, 38.0))),
            record("2", Some("Angle"), Some((-79.0, 36.0))),
            record("3", Some("Angle"), None),
        ];
        let colors = ColorAssignment::from_records(&records);

        let map = render_map(&records, &colors, &MapOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(map.plotted, 2);
        assert!((map.center.longitude - -78.0).abs() < 1e-9);
        assert!((map.center.latitude - 37.0).abs() < 1e-9);
        assert!(map.html.contains("setView([37, -78], 12)"));
    }

    #[test]
    fn nothing_plottable_renders_nothing() {
        let records = vec![record("1", Some("Angle"), None)];
        let colors = ColorAssignment::from_records(&records);
        assert!(
            render_map(&records, &colors, &MapOptions::default())
                .unwrap()
                .is_none()
        );
        assert!(mean_center(std::iter::empty()).is_none());
    }

    #[test]
    fn markers_carry_category_and_fallback_colours() {
        let records = vec![
            record("1", Some("Rear End"), Some((-77.0, 38.0))),
            record("2", None, Some((-77.1, 38.1))),
        ];
        let colors = ColorAssignment::from_records(&records);
        let map = render_map(&records, &colors, &MapOptions::default())
            .unwrap()
            .unwrap();

        let start = map.html.find("const crashes = ").unwrap() + "const crashes = ".len();
        let end = start + map.html[start..].find(";\n").unwrap();
        let data: serde_json::Value = serde_json::from_str(&map.html[start..end]).unwrap();
        let features = data["features"].as_array().unwrap();

        assert_eq!(features[0]["properties"]["color"], "#E69F00");
        assert_eq!(features[1]["properties"]["color"], FALLBACK_COLOR);
        assert_eq!(
            features[0]["geometry"]["coordinates"],
            serde_json::json!([-77.0, 38.0])
        );
        assert_eq!(features[0]["properties"]["severity_label"], "Fatal injury");
    }

    #[test]
    fn popup_escapes_and_fills_missing_values() {
        let mut crash = record("<b>1</b>", None, None);
        crash.crash_date = None;
        crash.severity = Some("X".to_string());

        let popup = popup_html(&crash);
        assert!(popup.contains("<b>Crash ID:</b> &lt;b&gt;1&lt;/b&gt;<br>"));
        assert!(popup.contains("<b>Crash Date:</b> N/A<br>"));
        assert!(popup.contains("<b>Severity:</b> X<br>"));
        assert!(popup.contains("<b>Collision Type:</b> N/A<br>"));
    }

    #[test]
    fn popup_labels_known_severity() {
        let popup = popup_html(&record("1", Some("Angle"), None));
        assert!(popup.contains("<b>Severity:</b> K (Fatal injury)<br>"));
        assert!(popup.contains("<b>Crash Date:</b> 2024-03-01<br>"));
    }

    #[test]
    fn placeholder_text_in_feed_values_is_left_alone() {
        let records = vec![record("__RADIUS__", Some("__ZOOM__"), Some((-77.0, 38.0)))];
        let colors = ColorAssignment::from_records(&records);
        let map = render_map(&records, &colors, &MapOptions::default())
            .unwrap()
            .unwrap();

        assert!(map.html.contains("</span>__ZOOM__<br>"));
        assert!(map.html.contains("\"collision_type\":\"__ZOOM__\""));
        assert!(map.html.contains("\"crash_id\":\"__RADIUS__\""));
        assert!(map.html.contains("radius: 6,"));
        assert!(!map.html.contains("__DATA__"));
    }

    #[test]
    fn fill_template_replaces_each_placeholder() {
        let filled = fill_template(
            "a __X__ b __Y__ c __X__",
            &[("__X__", "__Y__".to_string()), ("__Y__", "2".to_string())],
        );
        assert_eq!(filled, "a __Y__ b 2 c __Y__");
    }

    #[test]
    fn legend_lists_categories_then_fallback() {
        let colors = ColorAssignment::from_categories([Some("Angle"), Some("Rear End")]);
        let legend = legend_html(&colors);
        let angle = legend.find("#E69F00\"></span>Angle").unwrap();
        let rear = legend.find("#56B4E9\"></span>Rear End").unwrap();
        let other = legend.find("black\"></span>Other / unknown").unwrap();
        assert!(angle < rear && rear < other);
    }
}
