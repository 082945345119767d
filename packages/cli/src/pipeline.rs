//! Pipeline wiring: retrieve, normalize, window, then hand the result set to
//! each sink.
//!
//! Nothing is written until the full feed has been retrieved. A failed page
//! aborts the run before any sink sees a record.

use std::path::PathBuf;
use std::time::Instant;

use crash_map_cli_utils::{IndicatifProgress, MultiProgress};
use crash_map_crash_models::NormalizedRecord;
use crash_map_database::{WriteMode, db, queries};
use crash_map_generate::color::ColorAssignment;
use crash_map_generate::map::MapOptions;
use crash_map_source::SourceError;
use crash_map_source::feed::{self, FeedDefinition};
use crash_map_source::fetcher::ArcGisPageFetcher;
use crash_map_source::normalize::normalize_all;
use crash_map_source::paginate::{PaginationOptions, fetch_all_pages};

use crate::{FeedArgs, OutputArgs};

/// Everything a run needs, with CLI overrides applied.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub feed: FeedDefinition,
    pub window_size: usize,
    pub output_dir: PathBuf,
    pub pagination: PaginationOptions,
}

impl PipelineConfig {
    /// Resolves the feed definition and fills in output defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the feed cannot be loaded or the overrides
    /// leave it invalid.
    pub fn resolve(feed_args: &FeedArgs, output: &OutputArgs) -> Result<Self, SourceError> {
        Ok(Self {
            feed: resolve_feed(feed_args)?,
            window_size: output
                .limit
                .unwrap_or(crash_map_window::DEFAULT_WINDOW_SIZE),
            output_dir: output
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(crash_map_generate::DEFAULT_OUTPUT_DIR)),
            pagination: PaginationOptions {
                max_pages: output.max_pages,
            },
        })
    }
}

/// Loads the feed named by `--feed` (or the built-in one) and applies the
/// date range and page size overrides.
///
/// # Errors
///
/// Returns [`SourceError`] if the definition cannot be read or is invalid
/// after the overrides.
pub fn resolve_feed(args: &FeedArgs) -> Result<FeedDefinition, SourceError> {
    let mut definition = match &args.feed {
        Some(path) => feed::load_feed(path)?,
        None => feed::default_feed()?,
    };

    if let Some(start) = args.start {
        definition.start_date = start;
    }
    if let Some(end) = args.end {
        definition.end_date = end;
    }
    if let Some(page_size) = args.page_size {
        definition.page_size = page_size;
    }

    definition.validate()?;
    Ok(definition)
}

/// Maps the `--replace` / `--skip-db` flags to a database write mode.
#[must_use]
pub const fn persist_mode(replace: bool, skip_db: bool) -> Option<WriteMode> {
    match (skip_db, replace) {
        (true, _) => None,
        (false, true) => Some(WriteMode::Replace),
        (false, false) => Some(WriteMode::Upsert),
    }
}

/// The windowed records plus the colours built from the whole feed.
struct ResultSet {
    records: Vec<NormalizedRecord>,
    colors: ColorAssignment,
    total: usize,
}

/// Retrieves every page, normalizes it and keeps the most recent
/// `window_size` records.
async fn retrieve(config: &PipelineConfig, multi: &MultiProgress) -> Result<ResultSet, SourceError> {
    let feed = &config.feed;
    log::info!(
        "Fetching {} ({} to {}, {} per page)",
        feed.name,
        feed.start_date,
        feed.end_date,
        feed.page_size
    );

    let fetcher = ArcGisPageFetcher::new(feed)?;
    let progress = IndicatifProgress::features_spinner(multi, &feed.name);

    let features = match fetch_all_pages(&fetcher, config.pagination, progress.as_ref()).await {
        Ok(features) => features,
        Err(SourceError::Fetch(e)) => {
            progress.finish(format!("Failed at offset {}", e.offset));
            log::error!(
                "Retrieval aborted at offset {} ({}), no output written",
                e.offset,
                e.kind
            );
            return Err(SourceError::Fetch(e));
        }
        Err(e) => {
            progress.finish("Failed".to_string());
            return Err(e);
        }
    };

    let normalized = normalize_all(features, &feed.fields);
    let colors = ColorAssignment::from_records(&normalized);
    if colors.is_empty() {
        log::warn!("No collision types in the feed, every marker uses the fallback colour");
    } else {
        log::info!("{} collision types observed", colors.len());
    }

    let records = crash_map_window::select_recent(&normalized, config.window_size);

    Ok(ResultSet {
        records,
        colors,
        total: normalized.len(),
    })
}

/// Runs the full pipeline: retrieve, then the database (unless `persist` is
/// `None`), CSV and map sinks in that order.
///
/// # Errors
///
/// Returns an error if retrieval or any sink fails.
pub async fn run(
    config: &PipelineConfig,
    persist: Option<WriteMode>,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let result = retrieve(config, multi).await?;
    let feed = &config.feed;

    log::info!(
        "Keeping {} of {} records",
        result.records.len(),
        result.total
    );

    if let Some(mode) = persist {
        let db = db::connect_from_env().await?;
        queries::write_records(db.as_ref(), &result.records, mode).await?;
        let count = queries::count_records(db.as_ref()).await?;
        log::info!("crash_data now holds {count} rows");
    } else {
        log::info!("Skipping database write");
    }

    let csv_path = crash_map_generate::csv_path(&config.output_dir, &feed.id);
    crash_map_generate::export::write_csv(&csv_path, &result.records)?;

    let map_path = crash_map_generate::map_path(&config.output_dir, &feed.id);
    let options = MapOptions {
        title: feed.name.clone(),
        ..MapOptions::default()
    };
    crash_map_generate::map::write_map(&map_path, &result.records, &result.colors, &options)?;

    log::info!("Pipeline complete in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Retrieves the feed and writes the CSV only.
///
/// # Errors
///
/// Returns an error if retrieval or the CSV write fails.
pub async fn fetch_csv(
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = retrieve(config, multi).await?;

    let csv_path = crash_map_generate::csv_path(&config.output_dir, &config.feed.id);
    crash_map_generate::export::write_csv(&csv_path, &result.records)?;

    Ok(())
}

/// Prints the feed definition as TOML followed by the URL of its first page.
///
/// # Errors
///
/// Returns an error if the definition cannot be serialized or the URL
/// cannot be built.
pub fn print_feed(definition: &FeedDefinition) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = ArcGisPageFetcher::new(definition)?;

    println!("{}", toml::to_string_pretty(definition)?);
    println!("first page: {}", fetcher.page_url(0)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_mode_flags() {
        assert_eq!(persist_mode(false, false), Some(WriteMode::Upsert));
        assert_eq!(persist_mode(true, false), Some(WriteMode::Replace));
        assert_eq!(persist_mode(false, true), None);
        assert_eq!(persist_mode(true, true), None);
    }

    #[test]
    fn overrides_apply_to_default_feed() {
        let args = FeedArgs {
            feed: None,
            start: chrono::NaiveDate::from_ymd_opt(2024, 6, 1),
            end: chrono::NaiveDate::from_ymd_opt(2024, 6, 30),
            page_size: Some(500),
        };
        let definition = resolve_feed(&args).unwrap();
        assert_eq!(definition.start_date.to_string(), "2024-06-01");
        assert_eq!(definition.end_date.to_string(), "2024-06-30");
        assert_eq!(definition.page_size, 500);
    }

    #[test]
    fn inverted_date_override_is_rejected() {
        let args = FeedArgs {
            start: chrono::NaiveDate::from_ymd_opt(2025, 1, 1),
            ..FeedArgs::default()
        };
        assert!(matches!(
            resolve_feed(&args),
            Err(SourceError::Config { .. })
        ));
    }

    #[test]
    fn output_defaults() {
        let config = PipelineConfig::resolve(&FeedArgs::default(), &OutputArgs::default()).unwrap();
        assert_eq!(config.window_size, 10_000);
        assert_eq!(config.output_dir, PathBuf::from("data/generated"));
        assert_eq!(config.pagination.max_pages, None);
    }
}
