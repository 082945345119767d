#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output generation for a crash result set.
//!
//! Everything here consumes the already-windowed records: [`export`] writes
//! the delimited file, [`color`] assigns marker colours per collision type,
//! and [`map`] renders the standalone Leaflet page.

pub mod color;
pub mod export;
pub mod map;

use std::path::{Path, PathBuf};

/// Errors that can occur while writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// I/O error (file write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Default directory for generated files, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "data/generated";

/// Path of the CSV export for a feed.
#[must_use]
pub fn csv_path(dir: &Path, feed_id: &str) -> PathBuf {
    dir.join(format!("{feed_id}.csv"))
}

/// Path of the HTML map for a feed.
#[must_use]
pub fn map_path(dir: &Path, feed_id: &str) -> PathBuf {
    dir.join(format!("{feed_id}_map.html"))
}
