#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bounded most-recent window over normalized crash records.

use std::cmp::Reverse;

use crash_map_crash_models::NormalizedRecord;

/// Default number of records kept for output.
pub const DEFAULT_WINDOW_SIZE: usize = 10_000;

/// Returns the `max_count` most recent records, newest first.
///
/// Records sharing a date keep their original relative order. Records
/// without a date sort after every dated record, so they are the first to
/// be cut. The input is left untouched.
#[must_use]
pub fn select_recent(records: &[NormalizedRecord], max_count: usize) -> Vec<NormalizedRecord> {
    let mut ranked: Vec<&NormalizedRecord> = records.iter().collect();
    // `Option` orders `None` below `Some`, so reversing puts undated last.
    // `sort_by_key` is stable.
    ranked.sort_by_key(|record| Reverse(record.crash_date));
    ranked.truncate(max_count);

    log::debug!(
        "Selected {} of {} records (window size {max_count})",
        ranked.len(),
        records.len()
    );

    ranked.into_iter().cloned().collect()
}
