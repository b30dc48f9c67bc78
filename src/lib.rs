//! Series Harvester Core Library
//!
//! Walks the episode pages of a multi-season series, collects the playable
//! links each page offers, stores them in a SQLite catalog and later drains
//! that catalog through bounded-concurrency yt-dlp downloads.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`catalog`] - Series/Season/Episode/Link store
//! - [`discovery`] - Link discovery capabilities and URL pattern helpers
//! - [`traversal`] - Sequential episode walking and link persistence
//! - [`download`] - Download scheduler and external downloader
//! - [`export`] - JSON/CSV/batch export of the catalog
//! - [`validation`] - Re-checking stored links

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod db;
pub mod discovery;
pub mod download;
pub mod export;
pub mod traversal;
pub mod user_agent;
pub mod validation;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, CatalogRepository, CatalogStatistics};
pub use db::{Database, DbError};
pub use discovery::{DiscoveryError, DiscoveryRegistry, HttpPageDiscovery, LinkDiscovery};
pub use download::{
    DownloadRequest, DownloadResult, DownloadScheduler, ExternalDownloader, SchedulerError,
    YtDlpDownloader,
};
pub use traversal::{StopReason, TraversalEngine, TraversalError, TraversalOptions, TraversalResult};
