//! Repository seam for catalog persistence operations.
//!
//! The traversal engine and download scheduler depend on this trait rather
//! than on [`Catalog`] directly, so tests can drive them against any store.

use async_trait::async_trait;

use super::{
    Catalog, DownloadStatus, Episode, EpisodeStatus, LinkCandidate, PendingDownload,
    PendingLinkFilter, Result, Season, Series, SeriesStatus,
};

/// Data-access contract used by the traversal and download engines.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Matches a series by name/clean name or creates it.
    async fn get_or_create_series(
        &self,
        name: &str,
        clean_name: &str,
        original_url: &str,
    ) -> Result<Series>;

    /// Sets a series' lifecycle status.
    async fn update_series_status(
        &self,
        id: i64,
        status: SeriesStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Idempotent season lookup/creation.
    async fn get_or_create_season(&self, series_id: i64, number: u32) -> Result<Season>;

    /// Idempotent episode lookup/creation.
    async fn get_or_create_episode(
        &self,
        season: &Season,
        number: u32,
        url: Option<&str>,
    ) -> Result<Episode>;

    /// Sets an episode's discovery status.
    async fn update_episode_status(
        &self,
        episode_id: i64,
        status: EpisodeStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Number of links stored for an episode.
    async fn episode_link_count(&self, episode_id: i64) -> Result<i64>;

    /// Removes all links of an episode.
    async fn delete_episode_links(&self, episode_id: i64) -> Result<u64>;

    /// Inserts links not yet stored; returns the inserted candidates.
    async fn insert_new_links(
        &self,
        episode_id: i64,
        links: &[LinkCandidate],
    ) -> Result<Vec<LinkCandidate>>;

    /// Inserts links not yet stored; returns the inserted count.
    async fn add_links_if_absent(&self, episode_id: i64, links: &[LinkCandidate]) -> Result<usize> {
        Ok(self.insert_new_links(episode_id, links).await?.len())
    }

    /// Valid, not-yet-downloaded links in catalog order.
    async fn get_pending_download_links(
        &self,
        filter: &PendingLinkFilter,
    ) -> Result<Vec<PendingDownload>>;

    /// Records a download status change for a link.
    async fn update_link_download_status(
        &self,
        link_id: i64,
        status: DownloadStatus,
        error: Option<&str>,
        path: Option<&str>,
    ) -> Result<()>;
}

#[async_trait]
impl CatalogRepository for Catalog {
    async fn get_or_create_series(
        &self,
        name: &str,
        clean_name: &str,
        original_url: &str,
    ) -> Result<Series> {
        Catalog::get_or_create_series(self, name, clean_name, original_url).await
    }

    async fn update_series_status(
        &self,
        id: i64,
        status: SeriesStatus,
        error: Option<&str>,
    ) -> Result<()> {
        Catalog::update_series_status(self, id, status, error).await
    }

    async fn get_or_create_season(&self, series_id: i64, number: u32) -> Result<Season> {
        Catalog::get_or_create_season(self, series_id, number).await
    }

    async fn get_or_create_episode(
        &self,
        season: &Season,
        number: u32,
        url: Option<&str>,
    ) -> Result<Episode> {
        Catalog::get_or_create_episode(self, season, number, url).await
    }

    async fn update_episode_status(
        &self,
        episode_id: i64,
        status: EpisodeStatus,
        error: Option<&str>,
    ) -> Result<()> {
        Catalog::update_episode_status(self, episode_id, status, error).await
    }

    async fn episode_link_count(&self, episode_id: i64) -> Result<i64> {
        Catalog::episode_link_count(self, episode_id).await
    }

    async fn delete_episode_links(&self, episode_id: i64) -> Result<u64> {
        Catalog::delete_episode_links(self, episode_id).await
    }

    async fn insert_new_links(
        &self,
        episode_id: i64,
        links: &[LinkCandidate],
    ) -> Result<Vec<LinkCandidate>> {
        Catalog::insert_new_links(self, episode_id, links).await
    }

    async fn get_pending_download_links(
        &self,
        filter: &PendingLinkFilter,
    ) -> Result<Vec<PendingDownload>> {
        Catalog::get_pending_download_links(self, filter).await
    }

    async fn update_link_download_status(
        &self,
        link_id: i64,
        status: DownloadStatus,
        error: Option<&str>,
        path: Option<&str>,
    ) -> Result<()> {
        Catalog::update_link_download_status(self, link_id, status, error, path).await
    }
}
