#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crash map pipeline.
//!
//! `crash_map run` (also what a bare `crash_map` does) retrieves the whole
//! feed, keeps the most recent crashes, and writes them to PostgreSQL, a CSV
//! file and a Leaflet map. Log output goes through `indicatif-log-bridge`
//! (via [`crash_map_cli_utils::init_logger`]) so it never tears the fetch
//! spinner.

mod pipeline;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "crash_map", about = "Crash feed retrieval and mapping tool")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the feed and write the database table, CSV and map (default)
    Run {
        #[command(flatten)]
        feed: FeedArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Drop and recreate `crash_data` instead of upserting by crash ID
        #[arg(long, conflicts_with = "skip_db")]
        replace: bool,
        /// Skip the database write entirely
        #[arg(long)]
        skip_db: bool,
    },
    /// Fetch the feed and write the CSV only
    Fetch {
        #[command(flatten)]
        feed: FeedArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the resolved feed definition and its first request URL
    Feed {
        #[command(flatten)]
        feed: FeedArgs,
    },
}

/// Which feed to read and how to narrow it.
#[derive(Args, Debug, Clone, Default)]
pub struct FeedArgs {
    /// Feed definition TOML file (defaults to the built-in Virginia feed)
    #[arg(long)]
    pub feed: Option<PathBuf>,
    /// First crash date to request (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Last crash date to request (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Features per request (must not exceed the service's cap)
    #[arg(long)]
    pub page_size: Option<u64>,
}

/// Where results go and how many are kept.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Number of most recent crashes to keep (default: 10,000)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Directory for the CSV and map files (default: `data/generated`)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Abort if the feed is not exhausted after this many requests
    #[arg(long)]
    pub max_pages: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crash_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run {
        feed: FeedArgs::default(),
        output: OutputArgs::default(),
        replace: false,
        skip_db: false,
    });

    match command {
        Commands::Run {
            feed,
            output,
            replace,
            skip_db,
        } => {
            let config = pipeline::PipelineConfig::resolve(&feed, &output)?;
            let persist = pipeline::persist_mode(replace, skip_db);
            pipeline::run(&config, persist, &multi).await?;
        }
        Commands::Fetch { feed, output } => {
            let config = pipeline::PipelineConfig::resolve(&feed, &output)?;
            pipeline::fetch_csv(&config, &multi).await?;
        }
        Commands::Feed { feed } => {
            let definition = pipeline::resolve_feed(&feed)?;
            pipeline::print_feed(&definition)?;
        }
    }

    Ok(())
}
