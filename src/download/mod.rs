//! Download Scheduler: drains pending catalog links through an external
//! downloader with bounded parallelism and deterministic file placement.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvester_core::catalog::Catalog;
//! use harvester_core::download::{DownloadRequest, DownloadScheduler, YtDlpDownloader};
//! use harvester_core::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::new(Database::new_in_memory().await?);
//! let scheduler = DownloadScheduler::new(Arc::new(YtDlpDownloader::default()), 2)?;
//! let result = scheduler.start_downloads(&catalog, &DownloadRequest::default()).await?;
//! println!("Succeeded: {}, Failed: {}", result.succeeded, result.failed);
//! # Ok(())
//! # }
//! ```

mod downloader;
mod error;
pub mod filename;
mod scheduler;
mod task;

pub use downloader::{
    DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_QUALITY, DownloaderError, ExternalDownloader,
    YtDlpDownloader,
};
pub use error::{DownloadFailure, FailureKind, MAX_PARALLEL, MIN_PARALLEL, SchedulerError};
pub use filename::EpisodeTarget;
pub use scheduler::{
    DEFAULT_OUTPUT_DIR, DEFAULT_PARALLEL, DownloadRequest, DownloadResult, DownloadScheduler,
    DownloadStats,
};
