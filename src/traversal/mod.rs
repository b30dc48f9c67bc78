//! Traversal Engine: walks a series episode by episode, discovering links
//! and persisting them into the catalog.
//!
//! One run is strictly sequential. The next episode's URL may depend on the
//! page the capability just loaded, so episodes are never fetched in
//! parallel; concurrency belongs to the download phase.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvester_core::catalog::Catalog;
//! use harvester_core::discovery::{DiscoveryRegistry, HttpDiscoveryConfig, HttpPageDiscovery};
//! use harvester_core::traversal::{TraversalEngine, TraversalOptions};
//! use harvester_core::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::new(Database::new_in_memory().await?);
//! let mut registry = DiscoveryRegistry::new();
//! registry.register(Arc::new(HttpPageDiscovery::new(HttpDiscoveryConfig::default())));
//! let engine = TraversalEngine::new(Arc::new(registry));
//! let result = engine
//!     .run(&catalog, "https://s.to/serie/stream/show/staffel-1/episode-1", &TraversalOptions::default())
//!     .await?;
//! println!("{} links from {} episodes", result.total_links_found, result.processed_episodes);
//! # Ok(())
//! # }
//! ```

mod error;
mod options;
mod result;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::catalog::{CatalogRepository, EpisodeStatus, Series, SeriesStatus};
use crate::discovery::{DiscoveryRegistry, EpisodeContext, LinkDiscovery, url_pattern};
use crate::download::filename::sanitize_directory_name;

pub use error::TraversalError;
pub use options::{
    DEFAULT_DELAY_AFTER_ERROR, DEFAULT_DELAY_BETWEEN_EPISODES, DEFAULT_MAX_CONSECUTIVE_ERRORS,
    TraversalOptions,
};
pub use result::{StopReason, TraversalResult};

/// Mutable position of a run.
#[derive(Debug)]
struct WalkState {
    url: String,
    season: u32,
    episode: u32,
    consecutive_errors: usize,
}

/// Drives link discovery over a series.
#[derive(Debug, Clone)]
pub struct TraversalEngine {
    registry: Arc<DiscoveryRegistry>,
}

impl TraversalEngine {
    /// Creates an engine choosing capabilities from `registry`.
    #[must_use]
    pub fn new(registry: Arc<DiscoveryRegistry>) -> Self {
        Self { registry }
    }

    /// Registered capabilities.
    #[must_use]
    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    /// Walks the series starting at `start_url`.
    ///
    /// # Errors
    ///
    /// See [`run_interruptible`](Self::run_interruptible).
    pub async fn run<R>(
        &self,
        catalog: &R,
        start_url: &str,
        options: &TraversalOptions,
    ) -> Result<TraversalResult, TraversalError>
    where
        R: CatalogRepository + ?Sized,
    {
        self.run_interruptible(catalog, start_url, options, &AtomicBool::new(false))
            .await
    }

    /// Walks the series starting at `start_url`, checking `interrupted`
    /// before each episode.
    ///
    /// The series is marked Processing for the run and Completed, Cancelled
    /// or Failed at the end. The capability's `cleanup` runs exactly once
    /// whenever the capability was selected.
    ///
    /// # Errors
    ///
    /// - [`TraversalError::InvalidOptions`] before anything is written
    /// - [`TraversalError::NoCapability`] / [`TraversalError::Initialization`]
    ///   when no capability can run
    /// - [`TraversalError::Aborted`] on a discovery fault with
    ///   `continue_on_error` off
    /// - [`TraversalError::Catalog`] when progress cannot be persisted
    #[instrument(skip(self, catalog, options, interrupted), fields(url = %start_url))]
    pub async fn run_interruptible<R>(
        &self,
        catalog: &R,
        start_url: &str,
        options: &TraversalOptions,
        interrupted: &AtomicBool,
    ) -> Result<TraversalResult, TraversalError>
    where
        R: CatalogRepository + ?Sized,
    {
        options.validate()?;

        let name = options
            .series_name
            .as_deref()
            .map_or_else(|| url_pattern::series_name_from_url(start_url), |n| n.trim().to_string());
        let clean_name = sanitize_directory_name(&name);
        let series = catalog
            .get_or_create_series(&name, &clean_name, start_url)
            .await?;
        catalog
            .update_series_status(series.id, SeriesStatus::Processing, None)
            .await?;

        let Some(capability) = self
            .registry
            .find_best(start_url, &options.preferred_capability)
        else {
            let error = TraversalError::NoCapability {
                url: start_url.to_string(),
            };
            mark_series_failed(catalog, series.id, &error).await;
            return Err(error);
        };
        info!(
            series_id = series.id,
            series = %series.name,
            capability = capability.name(),
            "starting traversal"
        );

        if let Err(e) = capability.initialize().await {
            capability.cleanup().await;
            let error = TraversalError::Initialization(e);
            mark_series_failed(catalog, series.id, &error).await;
            return Err(error);
        }

        let walked = walk(catalog, capability.as_ref(), &series, start_url, options, interrupted).await;
        capability.cleanup().await;

        match walked {
            Ok(result) => {
                let status = if result.stop_reason == Some(StopReason::Cancelled) {
                    SeriesStatus::Cancelled
                } else {
                    SeriesStatus::Completed
                };
                catalog.update_series_status(series.id, status, None).await?;
                info!(
                    series_id = series.id,
                    processed = result.processed_episodes,
                    skipped = result.skipped_episodes,
                    links = result.total_links_found,
                    errors = result.total_errors,
                    stop_reason = ?result.stop_reason,
                    "traversal finished"
                );
                Ok(result)
            }
            Err(error) => {
                mark_series_failed(catalog, series.id, &error).await;
                Err(error)
            }
        }
    }
}

/// Best-effort: the run already failed, a second failure only gets logged.
async fn mark_series_failed<R>(catalog: &R, series_id: i64, error: &TraversalError)
where
    R: CatalogRepository + ?Sized,
{
    let message = error.to_string();
    if let Err(e) = catalog
        .update_series_status(series_id, SeriesStatus::Failed, Some(&message))
        .await
    {
        warn!(series_id, error = %e, "failed to mark series failed");
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn stop_condition(
    state: &WalkState,
    result: &TraversalResult,
    options: &TraversalOptions,
    interrupted: &AtomicBool,
) -> Option<StopReason> {
    if interrupted.load(Ordering::SeqCst) {
        return Some(StopReason::Cancelled);
    }
    if state.consecutive_errors >= options.max_consecutive_errors {
        return Some(StopReason::ConsecutiveErrors);
    }
    if options
        .max_episodes
        .is_some_and(|max| result.processed_episodes >= max)
    {
        return Some(StopReason::EpisodeLimit);
    }
    None
}

async fn walk<R>(
    catalog: &R,
    capability: &dyn LinkDiscovery,
    series: &Series,
    start_url: &str,
    options: &TraversalOptions,
    interrupted: &AtomicBool,
) -> Result<TraversalResult, TraversalError>
where
    R: CatalogRepository + ?Sized,
{
    let mut result = TraversalResult::new(series.id, &series.name, start_url);
    let mut state = WalkState {
        url: start_url.to_string(),
        season: options.start_season,
        episode: options.start_episode,
        consecutive_errors: 0,
    };

    let reason = loop {
        if let Some(reason) = stop_condition(&state, &result, options, interrupted) {
            break reason;
        }

        // The URL is authoritative whenever it carries the numbers
        if let Some(season) = url_pattern::season_from_url(&state.url) {
            state.season = season;
        }
        if let Some(episode) = url_pattern::episode_from_url(&state.url) {
            state.episode = episode;
        }
        debug!(season = state.season, episode = state.episode, url = %state.url, "visiting episode");

        let season = catalog.get_or_create_season(series.id, state.season).await?;
        let episode = catalog
            .get_or_create_episode(&season, state.episode, Some(&state.url))
            .await?;

        if options.force_rescrape {
            let removed = catalog.delete_episode_links(episode.id).await?;
            if removed > 0 {
                debug!(episode_id = episode.id, removed, "dropped stored links for rescrape");
            }
        } else if options.skips_existing() && catalog.episode_link_count(episode.id).await? > 0 {
            info!(season = state.season, episode = state.episode, "episode already has links; skipping");
            result.skipped_episodes += 1;
            if !advance(capability, &mut state).await {
                break StopReason::EndOfSeries;
            }
            continue;
        }

        catalog
            .update_episode_status(episode.id, EpisodeStatus::Processing, None)
            .await?;

        let context = EpisodeContext {
            series_name: series.name.clone(),
            season: state.season,
            episode: state.episode,
            episode_id: episode.id,
        };

        match capability.extract_links(&state.url, &context).await {
            Ok(links) if !links.is_empty() => {
                let inserted = catalog.insert_new_links(episode.id, &links).await?;
                catalog
                    .update_episode_status(episode.id, EpisodeStatus::LinksFound, None)
                    .await?;
                info!(
                    season = state.season,
                    episode = state.episode,
                    found = links.len(),
                    new = inserted.len(),
                    "links found"
                );
                result.record_new_links(&inserted);
                result.processed_episodes += 1;
                state.consecutive_errors = 0;
            }
            Ok(_) => {
                catalog
                    .update_episode_status(episode.id, EpisodeStatus::NoLinksFound, None)
                    .await?;
                state.consecutive_errors += 1;
                info!(
                    season = state.season,
                    episode = state.episode,
                    consecutive_errors = state.consecutive_errors,
                    max = options.max_consecutive_errors,
                    "no links found"
                );
                result.record_error(None);
                result.processed_episodes += 1;
            }
            Err(fault) => {
                let message = format!("S{}E{}: {fault}", state.season, state.episode);
                catalog
                    .update_episode_status(episode.id, EpisodeStatus::Failed, Some(&message))
                    .await?;
                state.consecutive_errors += 1;
                warn!(
                    season = state.season,
                    episode = state.episode,
                    consecutive_errors = state.consecutive_errors,
                    error = %fault,
                    "discovery failed"
                );
                result.record_error(Some(message));
                result.processed_episodes += 1;

                if !options.continue_on_error {
                    result.finish(None);
                    return Err(TraversalError::Aborted {
                        season: state.season,
                        episode: state.episode,
                        source: fault,
                        partial: Box::new(result),
                    });
                }

                // The capability's page state is suspect; derive from the URL only
                let next_episode = state.episode + 1;
                let Some(next) = url_pattern::next_episode_url(&state.url, next_episode) else {
                    break StopReason::EndOfSeries;
                };
                state.url = next;
                state.episode = next_episode;
                pause(options.delay_after_error).await;
                continue;
            }
        }

        if !advance(capability, &mut state).await {
            break StopReason::EndOfSeries;
        }
        pause(options.delay_between_episodes).await;
    };

    result.finish(Some(reason));
    Ok(result)
}

/// Moves `state` to the next episode. Returns `false` at the end of the series.
async fn advance(capability: &dyn LinkDiscovery, state: &mut WalkState) -> bool {
    let Some(next) = next_url(capability, &state.url, state.episode).await else {
        info!(season = state.season, episode = state.episode, "no further episode; series done");
        return false;
    };

    match url_pattern::season_from_url(&next) {
        Some(next_season) if next_season > state.season => {
            info!(from = state.season, to = next_season, "entering next season");
            state.season = next_season;
            state.episode = 1;
        }
        _ => state.episode += 1,
    }
    state.url = next;
    true
}

/// Asks the capability first, then rewrites the episode marker in the URL.
async fn next_url(capability: &dyn LinkDiscovery, current: &str, episode: u32) -> Option<String> {
    match capability.next_episode_url(current).await {
        Ok(Some(next)) if next != current => return Some(next),
        Ok(_) => {}
        Err(e) => warn!(error = %e, url = current, "capability could not find next episode"),
    }
    url_pattern::next_episode_url(current, episode + 1)
}
