//! Catalog store for the series → season → episode → link hierarchy.
//!
//! This module provides `SQLite`-backed persistence for everything the
//! traversal engine discovers and the download scheduler consumes.
//!
//! # Overview
//!
//! - [`Catalog`] - Main interface for catalog reads and writes
//! - [`CatalogRepository`] - Data-access seam used by the engines
//! - [`Series`], [`Season`], [`Episode`], [`DownloadableLink`] - Entities
//! - [`CatalogError`] - Operation error types
//!
//! Every mutation is a single statement or a single transaction keyed by one
//! entity. Uniqueness conflicts on `(series, season)`, `(season, episode)` and
//! `(episode, url)` resolve to the existing row instead of an error.
//!
//! # Example
//!
//! ```ignore
//! use harvester_core::catalog::{Catalog, LinkCandidate, LinkType};
//! use harvester_core::Database;
//!
//! let catalog = Catalog::new(Database::new_in_memory().await?);
//! let series = catalog.get_or_create_series("Show", "Show", "https://host/serie/show").await?;
//! let season = catalog.get_or_create_season(series.id, 1).await?;
//! let episode = catalog.get_or_create_episode(&season, 1, Some("https://host/serie/show/staffel-1/episode-1")).await?;
//! let added = catalog
//!     .add_links_if_absent(episode.id, &[LinkCandidate::new("https://vidmoly.to/embed-x.html", "vidmoly.to", LinkType::Embed)])
//!     .await?;
//! ```

mod error;
mod model;
mod repository;

pub use error::{CatalogDbErrorKind, CatalogError, UnknownEnumCode};
pub use model::{
    CatalogStatistics, DownloadStatus, DownloadableLink, ENUM_MAPPING_VERSION, Episode,
    EpisodeOverview, EpisodeStatus, ExportRow, LinkCandidate, LinkQuality, LinkType,
    PendingDownload, PendingLinkFilter, PersistedCode, Season, Series, SeriesStatus,
    SeriesSummary,
};
pub use repository::CatalogRepository;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::db::Database;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

const SERIES_COLUMNS: &str =
    "id, name, clean_name, original_url, status, error_message, created_at, updated_at";

const SEASON_COLUMNS: &str = "id, series_id, number, created_at, updated_at";

const EPISODE_COLUMNS: &str = "id, season_id, number, title, original_url, status, \
     error_message, created_at, processed_at, updated_at";

const LINK_COLUMNS: &str = "l.id, l.episode_id, l.url, l.host_name, l.link_type, l.quality, \
     l.is_valid, l.is_tested, l.found_at, l.last_validated, l.validation_error, \
     l.download_status, l.download_started, l.download_completed, l.download_path, \
     l.download_error";

/// Returns `Ok(())` if at least one row was affected; otherwise [`CatalogError::NotFound`].
fn check_affected(entity: &'static str, id: i64, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(CatalogError::NotFound { entity, id })
    } else {
        Ok(())
    }
}

/// Maps a foreign-key failure on insert to a missing parent row.
fn missing_parent(entity: &'static str, id: i64, err: CatalogError) -> CatalogError {
    if err.is_constraint_violation() {
        CatalogError::NotFound { entity, id }
    } else {
        err
    }
}

/// `SQLite` datetime modifier selecting rows older than `age`.
fn age_modifier(age: Duration) -> String {
    format!("-{} seconds", age.as_secs())
}

/// Catalog store.
///
/// Cheap to clone; clones share the pool and the per-series locks.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
    /// Serializes series lookup-then-insert.
    series_create_lock: Arc<Mutex<()>>,
    /// Serializes season/episode creation within one series.
    series_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl Catalog {
    /// Creates a catalog over the given database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            series_create_lock: Arc::new(Mutex::new(())),
            series_locks: Arc::new(DashMap::new()),
        }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn series_lock(&self, series_id: i64) -> Arc<Mutex<()>> {
        Arc::clone(
            self.series_locks
                .entry(series_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    // ==================== Series ====================

    /// Finds a series whose name or clean name matches, or inserts a new one
    /// in `Processing` state.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the lookup or insert fails.
    #[instrument(skip(self, original_url), fields(name = %name))]
    pub async fn get_or_create_series(
        &self,
        name: &str,
        clean_name: &str,
        original_url: &str,
    ) -> Result<Series> {
        let _guard = self.series_create_lock.lock().await;

        let existing: Option<Series> = sqlx::query_as(&format!(
            "SELECT {SERIES_COLUMNS} FROM series WHERE name = ? OR clean_name = ? ORDER BY id LIMIT 1"
        ))
        .bind(name)
        .bind(clean_name)
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(series) = existing {
            debug!(series_id = series.id, "matched existing series");
            return Ok(series);
        }

        let series: Series = sqlx::query_as(&format!(
            "INSERT INTO series (name, clean_name, original_url, status) VALUES (?, ?, ?, ?) \
             RETURNING {SERIES_COLUMNS}"
        ))
        .bind(name)
        .bind(clean_name)
        .bind(original_url)
        .bind(SeriesStatus::Processing.code())
        .fetch_one(self.db.pool())
        .await?;

        info!(series_id = series.id, "created series");
        Ok(series)
    }

    /// Looks up a series by name or clean name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_series(&self, name: &str) -> Result<Option<Series>> {
        let series = sqlx::query_as(&format!(
            "SELECT {SERIES_COLUMNS} FROM series WHERE name = ?1 OR clean_name = ?1 ORDER BY id LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(series)
    }

    /// Gets a series by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_series(&self, id: i64) -> Result<Option<Series>> {
        let series = sqlx::query_as(&format!("SELECT {SERIES_COLUMNS} FROM series WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(series)
    }

    /// Sets a series' status and error message.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the series does not exist.
    #[instrument(skip(self, error))]
    pub async fn update_series_status(
        &self,
        id: i64,
        status: SeriesStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE series SET status = ?, error_message = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(status.code())
        .bind(error)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_affected("series", id, result.rows_affected())
    }

    // ==================== Seasons & Episodes ====================

    /// Returns the season `number` of a series, creating it on first use.
    ///
    /// Concurrent callers for the same key observe the same row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the series does not exist.
    #[instrument(skip(self))]
    pub async fn get_or_create_season(&self, series_id: i64, number: u32) -> Result<Season> {
        let lock = self.series_lock(series_id);
        let _guard = lock.lock().await;

        sqlx::query(
            "INSERT INTO seasons (series_id, number) VALUES (?, ?) \
             ON CONFLICT(series_id, number) DO NOTHING",
        )
        .bind(series_id)
        .bind(number)
        .execute(self.db.pool())
        .await
        .map_err(|e| missing_parent("series", series_id, e.into()))?;

        let season = sqlx::query_as(&format!(
            "SELECT {SEASON_COLUMNS} FROM seasons WHERE series_id = ? AND number = ?"
        ))
        .bind(series_id)
        .bind(number)
        .fetch_one(self.db.pool())
        .await?;
        Ok(season)
    }

    /// Returns episode `number` of a season, creating it on first use.
    ///
    /// An existing episode keeps its stored URL unless it had none.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the season does not exist.
    #[instrument(skip(self, season, url), fields(season_id = season.id))]
    pub async fn get_or_create_episode(
        &self,
        season: &Season,
        number: u32,
        url: Option<&str>,
    ) -> Result<Episode> {
        let lock = self.series_lock(season.series_id);
        let _guard = lock.lock().await;

        sqlx::query(
            "INSERT INTO episodes (season_id, number, original_url, status) VALUES (?, ?, ?, ?) \
             ON CONFLICT(season_id, number) DO UPDATE \
             SET original_url = COALESCE(episodes.original_url, excluded.original_url)",
        )
        .bind(season.id)
        .bind(number)
        .bind(url)
        .bind(EpisodeStatus::Pending.code())
        .execute(self.db.pool())
        .await
        .map_err(|e| missing_parent("season", season.id, e.into()))?;

        let episode = sqlx::query_as(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes WHERE season_id = ? AND number = ?"
        ))
        .bind(season.id)
        .bind(number)
        .fetch_one(self.db.pool())
        .await?;
        Ok(episode)
    }

    /// Finds an episode by its position in a series.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_episode(
        &self,
        series_id: i64,
        season: u32,
        episode: u32,
    ) -> Result<Option<Episode>> {
        let episode = sqlx::query_as(
            "SELECT e.id, e.season_id, e.number, e.title, e.original_url, e.status, \
                    e.error_message, e.created_at, e.processed_at, e.updated_at \
             FROM episodes e JOIN seasons se ON se.id = e.season_id \
             WHERE se.series_id = ? AND se.number = ? AND e.number = ?",
        )
        .bind(series_id)
        .bind(season)
        .bind(episode)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(episode)
    }

    /// Sets an episode's discovery status; `LinksFound` also stamps `processed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the episode does not exist.
    #[instrument(skip(self, error))]
    pub async fn update_episode_status(
        &self,
        episode_id: i64,
        status: EpisodeStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE episodes SET status = ?1, error_message = ?2, updated_at = datetime('now'), \
             processed_at = CASE WHEN ?1 = ?3 THEN datetime('now') ELSE processed_at END \
             WHERE id = ?4",
        )
        .bind(status.code())
        .bind(error)
        .bind(EpisodeStatus::LinksFound.code())
        .bind(episode_id)
        .execute(self.db.pool())
        .await?;

        check_affected("episode", episode_id, result.rows_affected())
    }

    // ==================== Links ====================

    /// Inserts the links not yet stored for this episode.
    ///
    /// Runs in one transaction; duplicates (by URL, also within `links`)
    /// are skipped without error.
    ///
    /// # Returns
    ///
    /// How many rows were newly added.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the episode does not exist.
    pub async fn add_links_if_absent(
        &self,
        episode_id: i64,
        links: &[LinkCandidate],
    ) -> Result<usize> {
        Ok(self.insert_new_links(episode_id, links).await?.len())
    }

    /// Like [`add_links_if_absent`](Self::add_links_if_absent), returning the
    /// candidates that were actually inserted, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the episode does not exist.
    #[instrument(skip(self, links), fields(candidates = links.len()))]
    pub async fn insert_new_links(
        &self,
        episode_id: i64,
        links: &[LinkCandidate],
    ) -> Result<Vec<LinkCandidate>> {
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = Vec::new();

        for link in links {
            let result = sqlx::query(
                "INSERT INTO links (episode_id, url, host_name, link_type, quality) \
                 VALUES (?, ?, ?, ?, ?) ON CONFLICT(episode_id, url) DO NOTHING",
            )
            .bind(episode_id)
            .bind(&link.url)
            .bind(&link.host_name)
            .bind(link.link_type.code())
            .bind(link.quality.code())
            .execute(&mut *tx)
            .await
            .map_err(|e| missing_parent("episode", episode_id, e.into()))?;
            if result.rows_affected() > 0 {
                inserted.push(link.clone());
            }
        }

        tx.commit().await?;

        debug!(episode_id, inserted = inserted.len(), "stored new links");
        Ok(inserted)
    }

    /// Counts the links stored for an episode.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn episode_link_count(&self, episode_id: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM links WHERE episode_id = ?")
            .bind(episode_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Lists an episode's links in discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn links_for_episode(&self, episode_id: i64) -> Result<Vec<DownloadableLink>> {
        let links = sqlx::query_as(&format!(
            "SELECT {LINK_COLUMNS} FROM links l WHERE l.episode_id = ? ORDER BY l.id"
        ))
        .bind(episode_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(links)
    }

    /// Deletes every link of an episode, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_episode_links(&self, episode_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM links WHERE episode_id = ?")
            .bind(episode_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Gets a link by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_link(&self, id: i64) -> Result<Option<DownloadableLink>> {
        let link = sqlx::query_as(&format!("SELECT {LINK_COLUMNS} FROM links l WHERE l.id = ?"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(link)
    }

    /// Returns valid links that have not been downloaded, ordered by series
    /// name, season number and episode number.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_pending_download_links(
        &self,
        filter: &PendingLinkFilter,
    ) -> Result<Vec<PendingDownload>> {
        let pending = sqlx::query_as(&format!(
            "SELECT {LINK_COLUMNS}, s.name AS series_name, s.clean_name AS series_clean_name, \
                    se.number AS season_number, e.number AS episode_number \
             FROM links l \
             JOIN episodes e ON e.id = l.episode_id \
             JOIN seasons se ON se.id = e.season_id \
             JOIN series s ON s.id = se.series_id \
             WHERE l.is_valid = 1 AND l.download_status = ?1 \
               AND (?2 IS NULL OR s.name = ?2 OR s.clean_name = ?2) \
               AND (?3 IS NULL OR se.number = ?3) \
               AND (?4 IS NULL OR e.number = ?4) \
             ORDER BY s.name, se.number, e.number, l.id"
        ))
        .bind(DownloadStatus::NotStarted.code())
        .bind(filter.series.as_deref())
        .bind(filter.season)
        .bind(filter.episode)
        .fetch_all(self.db.pool())
        .await?;
        Ok(pending)
    }

    /// Records a download status change for one link.
    ///
    /// `Downloading` stamps `download_started`, `Completed` stamps
    /// `download_completed`. The error is replaced on every call; the path
    /// is kept when `None` is passed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the link does not exist.
    #[instrument(skip(self, error, path))]
    pub async fn update_link_download_status(
        &self,
        link_id: i64,
        status: DownloadStatus,
        error: Option<&str>,
        path: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE links SET download_status = ?1, download_error = ?2, \
             download_path = COALESCE(?3, download_path), \
             download_started = CASE WHEN ?1 = ?4 THEN datetime('now') ELSE download_started END, \
             download_completed = CASE WHEN ?1 = ?5 THEN datetime('now') ELSE download_completed END \
             WHERE id = ?6",
        )
        .bind(status.code())
        .bind(error)
        .bind(path)
        .bind(DownloadStatus::Downloading.code())
        .bind(DownloadStatus::Completed.code())
        .bind(link_id)
        .execute(self.db.pool())
        .await?;

        check_affected("link", link_id, result.rows_affected())
    }

    /// Counts links in a download status.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_links_by_download_status(&self, status: DownloadStatus) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM links WHERE download_status = ?")
                .bind(status.code())
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    // ==================== Validation ====================

    /// Links the validation pass should check: untested ones, or all when `force`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn links_for_validation(
        &self,
        series: Option<&str>,
        force: bool,
    ) -> Result<Vec<DownloadableLink>> {
        let links = sqlx::query_as(&format!(
            "SELECT {LINK_COLUMNS} FROM links l \
             JOIN episodes e ON e.id = l.episode_id \
             JOIN seasons se ON se.id = e.season_id \
             JOIN series s ON s.id = se.series_id \
             WHERE (?1 = 1 OR l.is_tested = 0) \
               AND (?2 IS NULL OR s.name = ?2 OR s.clean_name = ?2) \
             ORDER BY s.name, se.number, e.number, l.id"
        ))
        .bind(force)
        .bind(series)
        .fetch_all(self.db.pool())
        .await?;
        Ok(links)
    }

    /// Stores a validation verdict and stamps `last_validated`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the link does not exist.
    #[instrument(skip(self, error))]
    pub async fn mark_link_validated(
        &self,
        link_id: i64,
        is_valid: bool,
        error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE links SET is_valid = ?, is_tested = 1, validation_error = ?, \
             last_validated = datetime('now') WHERE id = ?",
        )
        .bind(is_valid)
        .bind(error)
        .bind(link_id)
        .execute(self.db.pool())
        .await?;

        check_affected("link", link_id, result.rows_affected())
    }

    // ==================== Reporting ====================

    /// Counts every entity and download state.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn statistics(&self) -> Result<CatalogStatistics> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT \
               (SELECT COUNT(*) FROM series), \
               (SELECT COUNT(*) FROM seasons), \
               (SELECT COUNT(*) FROM episodes), \
               (SELECT COUNT(*) FROM links), \
               (SELECT COUNT(*) FROM links WHERE is_valid = 1), \
               (SELECT COUNT(*) FROM links WHERE download_status = ?1), \
               (SELECT COUNT(*) FROM links WHERE is_valid = 1 AND download_status = ?2), \
               (SELECT COUNT(*) FROM links WHERE download_status = ?3)",
        )
        .bind(DownloadStatus::Completed.code())
        .bind(DownloadStatus::NotStarted.code())
        .bind(DownloadStatus::Failed.code())
        .fetch_one(self.db.pool())
        .await?;

        Ok(CatalogStatistics {
            total_series: row.0,
            total_seasons: row.1,
            total_episodes: row.2,
            total_links: row.3,
            valid_links: row.4,
            completed_downloads: row.5,
            pending_downloads: row.6,
            failed_downloads: row.7,
        })
    }

    /// Lists series with child counters, optionally filtered by name or status.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_series(
        &self,
        name: Option<&str>,
        status: Option<SeriesStatus>,
    ) -> Result<Vec<SeriesSummary>> {
        let summaries = sqlx::query_as(
            "SELECT s.id, s.name, s.clean_name, s.original_url, s.status, s.error_message, \
                    s.created_at, s.updated_at, \
               (SELECT COUNT(*) FROM seasons se WHERE se.series_id = s.id) AS total_seasons, \
               (SELECT COUNT(*) FROM episodes e JOIN seasons se ON se.id = e.season_id \
                 WHERE se.series_id = s.id) AS total_episodes, \
               (SELECT COUNT(*) FROM links l JOIN episodes e ON e.id = l.episode_id \
                 JOIN seasons se ON se.id = e.season_id WHERE se.series_id = s.id) AS found_links, \
               (SELECT COUNT(*) FROM links l JOIN episodes e ON e.id = l.episode_id \
                 JOIN seasons se ON se.id = e.season_id \
                 WHERE se.series_id = s.id AND l.download_status = ?3) AS completed_downloads \
             FROM series s \
             WHERE (?1 IS NULL OR s.name = ?1 OR s.clean_name = ?1) \
               AND (?2 IS NULL OR s.status = ?2) \
             ORDER BY s.name, s.id",
        )
        .bind(name)
        .bind(status.map(PersistedCode::code))
        .bind(DownloadStatus::Completed.code())
        .fetch_all(self.db.pool())
        .await?;
        Ok(summaries)
    }

    /// Per-episode status and link counts for one series.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn episode_overview(&self, series_id: i64) -> Result<Vec<EpisodeOverview>> {
        let rows = sqlx::query_as(
            "SELECT se.number AS season_number, e.number AS episode_number, e.status, \
                    e.error_message, \
               (SELECT COUNT(*) FROM links l WHERE l.episode_id = e.id) AS link_count, \
               (SELECT COUNT(*) FROM links l WHERE l.episode_id = e.id \
                 AND l.download_status = ?2) AS completed_downloads \
             FROM episodes e JOIN seasons se ON se.id = e.season_id \
             WHERE se.series_id = ?1 \
             ORDER BY se.number, e.number",
        )
        .bind(series_id)
        .bind(DownloadStatus::Completed.code())
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Flattened link rows for export, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn export_rows(&self, series: Option<&str>) -> Result<Vec<ExportRow>> {
        let rows = sqlx::query_as(
            "SELECT s.name AS series_name, s.clean_name AS series_clean_name, \
                    se.number AS season_number, e.number AS episode_number, \
                    e.status AS episode_status, l.url, l.host_name, l.link_type, l.quality, \
                    l.is_valid, l.download_status, l.download_path, l.found_at \
             FROM links l \
             JOIN episodes e ON e.id = l.episode_id \
             JOIN seasons se ON se.id = e.season_id \
             JOIN series s ON s.id = se.series_id \
             WHERE (?1 IS NULL OR s.name = ?1 OR s.clean_name = ?1) \
             ORDER BY s.name, se.number, e.number, l.id",
        )
        .bind(series)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    // ==================== Cleanup ====================

    /// Deletes links marked invalid whose last validation is older than `older_than`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn cleanup_invalid_links(&self, older_than: Duration) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM links WHERE is_valid = 0 AND last_validated < datetime('now', ?)",
        )
        .bind(age_modifier(older_than))
        .execute(self.db.pool())
        .await?;

        let removed = result.rows_affected();
        info!(removed, "removed invalid links");
        Ok(removed)
    }

    /// Counts what [`Catalog::cleanup_invalid_links`] would delete.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_invalid_links(&self, older_than: Duration) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM links WHERE is_valid = 0 AND last_validated < datetime('now', ?)",
        )
        .bind(age_modifier(older_than))
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    /// Deletes failed series created before `older_than`, cascading to children.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn cleanup_failed_series(&self, older_than: Duration) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM series WHERE status = ? AND created_at < datetime('now', ?)")
                .bind(SeriesStatus::Failed.code())
                .bind(age_modifier(older_than))
                .execute(self.db.pool())
                .await?;

        let removed = result.rows_affected();
        info!(removed, "removed failed series");
        Ok(removed)
    }

    /// Counts what [`Catalog::cleanup_failed_series`] would delete.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_failed_series(&self, older_than: Duration) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM series WHERE status = ? AND created_at < datetime('now', ?)",
        )
        .bind(SeriesStatus::Failed.code())
        .bind(age_modifier(older_than))
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    /// Deletes series that never got a season, except ones still processing.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn cleanup_empty_series(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM series WHERE status != ? \
             AND NOT EXISTS (SELECT 1 FROM seasons se WHERE se.series_id = series.id)",
        )
        .bind(SeriesStatus::Processing.code())
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// Counts what [`Catalog::cleanup_empty_series`] would delete.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_empty_series(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM series WHERE status != ? \
             AND NOT EXISTS (SELECT 1 FROM seasons se WHERE se.series_id = series.id)",
        )
        .bind(SeriesStatus::Processing.code())
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }
}
