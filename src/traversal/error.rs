//! Error types for the traversal engine.

use thiserror::Error;

use super::TraversalResult;
use crate::catalog::CatalogError;
use crate::discovery::DiscoveryError;

/// Errors that end a traversal run.
///
/// Episode-level faults under `continue_on_error` are not errors; they are
/// counted in the [`TraversalResult`].
#[derive(Debug, Error)]
pub enum TraversalError {
    /// The run options are inconsistent.
    #[error("invalid traversal options: {message}")]
    InvalidOptions {
        /// What is wrong.
        message: String,
    },

    /// No registered capability accepts the start URL.
    #[error(
        "no discovery capability can handle {url}\n  Suggestion: Check the URL or pass --host with a registered capability"
    )]
    NoCapability {
        /// The start URL.
        url: String,
    },

    /// The capability could not acquire its resources.
    #[error("discovery capability failed to start: {0}")]
    Initialization(#[source] DiscoveryError),

    /// A discovery fault with `continue_on_error` off.
    #[error("traversal aborted at S{season:02}E{episode:02}: {source}")]
    Aborted {
        season: u32,
        episode: u32,
        #[source]
        source: DiscoveryError,
        /// Progress made before the fault.
        partial: Box<TraversalResult>,
    },

    /// Persisting progress failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}
