//! Link discovery capabilities.
//!
//! A [`LinkDiscovery`] turns an episode page URL into candidate links. The
//! traversal engine only talks to this trait; page fetching, rendering and
//! site-specific matching stay behind it.
//!
//! # Modules
//!
//! - [`registry`] - name-keyed lookup of registered capabilities
//! - [`url_pattern`] - season/episode numbers and next-URL derivation from URLs
//! - [`http_page`] - built-in capability that scans fetched HTML for video links

pub mod http_page;
pub mod registry;
pub mod url_pattern;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::LinkCandidate;

pub use http_page::{HttpDiscoveryConfig, HttpPageDiscovery};
pub use registry::DiscoveryRegistry;

/// Where in a series the episode being discovered sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeContext {
    pub series_name: String,
    pub season: u32,
    pub episode: u32,
    /// Catalog row of the episode.
    pub episode_id: i64,
}

/// Infrastructure faults raised by a discovery capability.
///
/// "No links on this page" is not an error; capabilities return an empty list.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The capability could not acquire its resources.
    #[error("{capability} failed to initialize: {message}")]
    Initialization {
        /// Capability name.
        capability: String,
        /// What went wrong.
        message: String,
    },

    /// The page could not be loaded or navigated.
    #[error("navigation to {url} failed: {message}")]
    Navigation {
        /// Page URL.
        url: String,
        /// Underlying failure text.
        message: String,
    },

    /// The page did not load within the page-load ceiling.
    #[error("page load timed out: {url}")]
    Timeout {
        /// Page URL.
        url: String,
    },

    /// The server answered with an error status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Page URL.
        url: String,
        /// Response status code.
        status: u16,
    },
}

impl DiscoveryError {
    /// Builds a navigation error from any displayable failure.
    #[must_use]
    pub fn navigation(url: &str, message: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

/// A pluggable source of episode links.
///
/// Implementations hold whatever rendering resource they need between
/// [`LinkDiscovery::initialize`] and [`LinkDiscovery::cleanup`]; the traversal
/// engine calls each exactly once per run.
#[async_trait]
pub trait LinkDiscovery: Send + Sync {
    /// Registry key; matched case-insensitively.
    fn name(&self) -> &str;

    /// Whether this capability understands pages at `url`.
    fn can_handle(&self, url: &str) -> bool;

    /// Acquires rendering resources.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Initialization`] when the capability cannot run.
    async fn initialize(&self) -> Result<(), DiscoveryError>;

    /// Returns the candidate links on an episode page; may be empty.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure faults (timeouts, navigation).
    async fn extract_links(
        &self,
        episode_url: &str,
        context: &EpisodeContext,
    ) -> Result<Vec<LinkCandidate>, DiscoveryError>;

    /// URL of the episode after `current_url`, when the capability can tell.
    ///
    /// The default knows nothing; the engine then derives the URL itself.
    ///
    /// # Errors
    ///
    /// Returns an error when looking up the next page failed.
    async fn next_episode_url(&self, _current_url: &str) -> Result<Option<String>, DiscoveryError> {
        Ok(None)
    }

    /// Whether a stored link still resolves.
    ///
    /// # Errors
    ///
    /// Returns an error when the check itself could not be performed.
    async fn validate_link(&self, url: &str) -> Result<bool, DiscoveryError>;

    /// Releases rendering resources.
    async fn cleanup(&self);
}

/// Host attribution for a link: its domain without a leading `www.`.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase())
}
