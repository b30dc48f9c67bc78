//! Catalog entity types and their persisted integer mappings.
//!
//! Every status/type column stores a fixed integer code. Codes are checked on
//! read; an unknown code surfaces as a decode error instead of a silent default.

use std::fmt;

use serde::Serialize;
use sqlx::{FromRow, Row};
use sqlx::sqlite::SqliteRow;

use super::error::UnknownEnumCode;

/// Version of the integer mapping below, recorded in `catalog_meta`.
pub const ENUM_MAPPING_VERSION: i64 = 1;

/// A closed enumeration persisted as an integer column.
pub trait PersistedCode: Sized + Copy {
    /// Type name used in decode errors.
    const NAME: &'static str;

    /// Integer stored in the database.
    fn code(self) -> i64;

    /// Maps a stored integer back, `None` when the code is unknown.
    fn from_code(code: i64) -> Option<Self>;
}

/// Lifecycle of a series within a traversal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl SeriesStatus {
    /// Returns the display label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl PersistedCode for SeriesStatus {
    const NAME: &'static str = "SeriesStatus";

    fn code(self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed => 2,
            Self::Failed => 3,
            Self::Cancelled => 4,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Processing),
            2 => Some(Self::Completed),
            3 => Some(Self::Failed),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discovery outcome of a single episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Pending,
    Processing,
    LinksFound,
    NoLinksFound,
    Failed,
    Skipped,
}

impl EpisodeStatus {
    /// Returns the display label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::LinksFound => "links_found",
            Self::NoLinksFound => "no_links_found",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl PersistedCode for EpisodeStatus {
    const NAME: &'static str = "EpisodeStatus";

    fn code(self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::LinksFound => 2,
            Self::NoLinksFound => 3,
            Self::Failed => 4,
            Self::Skipped => 5,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Processing),
            2 => Some(Self::LinksFound),
            3 => Some(Self::NoLinksFound),
            4 => Some(Self::Failed),
            5 => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a discovered link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Unknown,
    M3U8,
    MP4,
    Embed,
    Direct,
}

impl LinkType {
    /// Returns the display label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::M3U8 => "m3u8",
            Self::MP4 => "mp4",
            Self::Embed => "embed",
            Self::Direct => "direct",
        }
    }
}

impl PersistedCode for LinkType {
    const NAME: &'static str = "LinkType";

    fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::M3U8 => 1,
            Self::MP4 => 2,
            Self::Embed => 3,
            Self::Direct => 4,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::M3U8),
            2 => Some(Self::MP4),
            3 => Some(Self::Embed),
            4 => Some(Self::Direct),
            _ => None,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advertised quality of a link, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkQuality {
    Unknown,
    Low,
    Medium,
    High,
    Ultra,
}

impl LinkQuality {
    /// Returns the display label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }
}

impl PersistedCode for LinkQuality {
    const NAME: &'static str = "LinkQuality";

    fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Ultra => 4,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::Ultra),
            _ => None,
        }
    }
}

impl fmt::Display for LinkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download lifecycle of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    NotStarted,
    Queued,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadStatus {
    /// Returns the display label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl PersistedCode for DownloadStatus {
    const NAME: &'static str = "DownloadStatus";

    fn code(self) -> i64 {
        match self {
            Self::NotStarted => 0,
            Self::Queued => 1,
            Self::Downloading => 2,
            Self::Completed => 3,
            Self::Failed => 4,
            Self::Cancelled => 5,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::NotStarted),
            1 => Some(Self::Queued),
            2 => Some(Self::Downloading),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            5 => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn decode_code<T: PersistedCode>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error> {
    let code: i64 = row.try_get(column)?;
    T::from_code(code).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(UnknownEnumCode {
            enum_name: T::NAME,
            code,
        }),
    })
}

pub(crate) fn decode_number(row: &SqliteRow, column: &str) -> Result<u32, sqlx::Error> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Top-level media container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub id: i64,
    pub name: String,
    /// Filesystem-safe form of `name`.
    pub clean_name: String,
    pub original_url: String,
    pub status: SeriesStatus,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for Series {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            clean_name: row.try_get("clean_name")?,
            original_url: row.try_get("original_url")?,
            status: decode_code(row, "status")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Ordered grouping of episodes within a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    pub id: i64,
    pub series_id: i64,
    pub number: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for Season {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            series_id: row.try_get("series_id")?,
            number: decode_number(row, "number")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Single unit of content; the unit of discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: i64,
    pub season_id: i64,
    pub number: u32,
    pub title: Option<String>,
    pub original_url: Option<String>,
    pub status: EpisodeStatus,
    pub error_message: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for Episode {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            season_id: row.try_get("season_id")?,
            number: decode_number(row, "number")?,
            title: row.try_get("title")?,
            original_url: row.try_get("original_url")?,
            status: decode_code(row, "status")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            processed_at: row.try_get("processed_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// One discovered, host-attributed URL for an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadableLink {
    pub id: i64,
    pub episode_id: i64,
    pub url: String,
    pub host_name: String,
    pub link_type: LinkType,
    pub quality: LinkQuality,
    pub is_valid: bool,
    pub is_tested: bool,
    pub found_at: String,
    pub last_validated: Option<String>,
    pub validation_error: Option<String>,
    pub download_status: DownloadStatus,
    pub download_started: Option<String>,
    pub download_completed: Option<String>,
    pub download_path: Option<String>,
    pub download_error: Option<String>,
}

impl<'r> FromRow<'r, SqliteRow> for DownloadableLink {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            episode_id: row.try_get("episode_id")?,
            url: row.try_get("url")?,
            host_name: row.try_get("host_name")?,
            link_type: decode_code(row, "link_type")?,
            quality: decode_code(row, "quality")?,
            is_valid: row.try_get("is_valid")?,
            is_tested: row.try_get("is_tested")?,
            found_at: row.try_get("found_at")?,
            last_validated: row.try_get("last_validated")?,
            validation_error: row.try_get("validation_error")?,
            download_status: decode_code(row, "download_status")?,
            download_started: row.try_get("download_started")?,
            download_completed: row.try_get("download_completed")?,
            download_path: row.try_get("download_path")?,
            download_error: row.try_get("download_error")?,
        })
    }
}

/// A link as returned by discovery, before it has a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub url: String,
    pub host_name: String,
    pub link_type: LinkType,
    pub quality: LinkQuality,
}

impl LinkCandidate {
    /// Creates a candidate with unknown quality.
    #[must_use]
    pub fn new(url: impl Into<String>, host_name: impl Into<String>, link_type: LinkType) -> Self {
        Self {
            url: url.into(),
            host_name: host_name.into(),
            link_type,
            quality: LinkQuality::Unknown,
        }
    }

    /// Sets the advertised quality.
    #[must_use]
    pub fn with_quality(mut self, quality: LinkQuality) -> Self {
        self.quality = quality;
        self
    }
}

/// Narrows pending-download queries. All fields unset selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingLinkFilter {
    /// Series name or clean name.
    pub series: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// A pending link joined with the naming context the scheduler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownload {
    pub link: DownloadableLink,
    pub series_name: String,
    pub series_clean_name: String,
    pub season_number: u32,
    pub episode_number: u32,
}

impl<'r> FromRow<'r, SqliteRow> for PendingDownload {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            link: DownloadableLink::from_row(row)?,
            series_name: row.try_get("series_name")?,
            series_clean_name: row.try_get("series_clean_name")?,
            season_number: decode_number(row, "season_number")?,
            episode_number: decode_number(row, "episode_number")?,
        })
    }
}

/// Point-in-time catalog counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStatistics {
    pub total_series: i64,
    pub total_seasons: i64,
    pub total_episodes: i64,
    pub total_links: i64,
    pub valid_links: i64,
    pub completed_downloads: i64,
    pub pending_downloads: i64,
    pub failed_downloads: i64,
}

impl CatalogStatistics {
    /// Share of links currently marked valid, in percent.
    #[must_use]
    pub fn valid_links_percentage(&self) -> f64 {
        percentage(self.valid_links, self.total_links)
    }

    /// Share of valid links already downloaded, in percent.
    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        percentage(self.completed_downloads, self.valid_links)
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// A series with counters derived from its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSummary {
    pub series: Series,
    pub total_seasons: i64,
    pub total_episodes: i64,
    pub found_links: i64,
    pub completed_downloads: i64,
}

impl<'r> FromRow<'r, SqliteRow> for SeriesSummary {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            series: Series::from_row(row)?,
            total_seasons: row.try_get("total_seasons")?,
            total_episodes: row.try_get("total_episodes")?,
            found_links: row.try_get("found_links")?,
            completed_downloads: row.try_get("completed_downloads")?,
        })
    }
}

/// Per-episode row for detailed status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeOverview {
    pub season_number: u32,
    pub episode_number: u32,
    pub status: EpisodeStatus,
    pub link_count: i64,
    pub completed_downloads: i64,
    pub error_message: Option<String>,
}

impl<'r> FromRow<'r, SqliteRow> for EpisodeOverview {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            season_number: decode_number(row, "season_number")?,
            episode_number: decode_number(row, "episode_number")?,
            status: decode_code(row, "status")?,
            link_count: row.try_get("link_count")?,
            completed_downloads: row.try_get("completed_downloads")?,
            error_message: row.try_get("error_message")?,
        })
    }
}

/// Flattened link row used by exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub series_name: String,
    pub series_clean_name: String,
    pub season_number: u32,
    pub episode_number: u32,
    pub episode_status: EpisodeStatus,
    pub url: String,
    pub host_name: String,
    pub link_type: LinkType,
    pub quality: LinkQuality,
    pub is_valid: bool,
    pub download_status: DownloadStatus,
    pub download_path: Option<String>,
    pub found_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for ExportRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            series_name: row.try_get("series_name")?,
            series_clean_name: row.try_get("series_clean_name")?,
            season_number: decode_number(row, "season_number")?,
            episode_number: decode_number(row, "episode_number")?,
            episode_status: decode_code(row, "episode_status")?,
            url: row.try_get("url")?,
            host_name: row.try_get("host_name")?,
            link_type: decode_code(row, "link_type")?,
            quality: decode_code(row, "quality")?,
            is_valid: row.try_get("is_valid")?,
            download_status: decode_code(row, "download_status")?,
            download_path: row.try_get("download_path")?,
            found_at: row.try_get("found_at")?,
        })
    }
}
