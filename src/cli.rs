//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use harvester_core::discovery::registry::AUTO;
use harvester_core::download::DEFAULT_QUALITY;
use harvester_core::validation::DEFAULT_BATCH_SIZE;

/// Harvest episode links for multi-season series and download them.
///
/// `extract` walks a series episode by episode and stores the links it finds;
/// `download` drains the stored links through yt-dlp.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Cli {
    /// Settings file (defaults to ~/.config/series-harvester/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// SQLite catalog file (overrides `database_path` from the settings file)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk a series from a start URL and store the links of every episode
    Extract(ExtractArgs),
    /// Download stored links with yt-dlp
    Download(DownloadArgs),
    /// Show catalog statistics and per-series progress
    Status(StatusArgs),
    /// Export stored links as JSON, CSV or a yt-dlp batch script
    Export(ExportArgs),
    /// Re-check stored links and record whether they still answer
    Validate(ValidateArgs),
    /// Remove stale invalid links and failed or empty series
    Cleanup(CleanupArgs),
}

/// Arguments for `extract`.
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Episode page to start from
    #[arg(long)]
    pub url: String,

    /// Series name (derived from the URL when omitted)
    #[arg(long)]
    pub series_name: Option<String>,

    /// Discovery capability to prefer
    #[arg(long, default_value = AUTO)]
    pub host: String,

    /// Season number of the start URL
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub start_season: u32,

    /// Episode number of the start URL
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub start_episode: u32,

    /// Stop after this many processed episodes
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_episodes: Option<u32>,

    /// Stop after this many episodes in a row without links (default from settings)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub max_errors: Option<u32>,

    /// Skip episodes that already have stored links
    #[arg(long)]
    pub skip_existing: bool,

    /// Drop stored links and extract again
    #[arg(long)]
    pub force_rescrape: bool,

    /// Abort on the first extraction fault
    #[arg(long)]
    pub stop_on_error: bool,
}

/// Arguments for `download`.
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Only links of this series (name or clean name)
    #[arg(long)]
    pub series: Option<String>,

    /// Only links of this season
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub season: Option<u32>,

    /// Only links of this episode
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub episode: Option<u32>,

    /// Download root (default from settings)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent downloads (1-100, default from settings)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub parallel: Option<u8>,

    /// yt-dlp format selector
    #[arg(long, default_value = DEFAULT_QUALITY)]
    pub quality: String,

    /// Download again even when the episode file exists
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for `status`.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Only this series
    #[arg(long)]
    pub series: Option<String>,

    /// List every episode
    #[arg(long)]
    pub detailed: bool,

    /// Only series currently being processed
    #[arg(long)]
    pub active_only: bool,
}

/// Arguments for `export`.
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Output format
    #[arg(long, default_value = "json", value_parser = ["json", "csv", "batch"])]
    pub format: String,

    /// Only this series
    #[arg(long)]
    pub series: Option<String>,

    /// Output file (defaults to a timestamped file in the export directory)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for `validate`.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Only links of this series
    #[arg(long)]
    pub series: Option<String>,

    /// Re-check links that were already validated
    #[arg(long)]
    pub force: bool,

    /// Links checked concurrently
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE as u32, value_parser = clap::value_parser!(u32).range(1..=500))]
    pub batch_size: u32,

    /// Per-link check timeout in seconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,
}

/// Arguments for `cleanup`.
#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Age threshold in days
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: u32,

    /// Report what would be removed without deleting
    #[arg(long)]
    pub dry_run: bool,

    /// Keep invalid links
    #[arg(long)]
    pub no_invalid: bool,

    /// Keep failed series
    #[arg(long)]
    pub no_failed: bool,

    /// Also remove series without any season
    #[arg(long)]
    pub empty_series: bool,
}
