//! Traversal run options.

use std::time::Duration;

use super::TraversalError;
use crate::discovery::registry::AUTO;

/// Default consecutive-error threshold.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: usize = 5;

/// Default pause between episodes.
pub const DEFAULT_DELAY_BETWEEN_EPISODES: Duration = Duration::from_millis(500);

/// Default pause after a discovery fault.
pub const DEFAULT_DELAY_AFTER_ERROR: Duration = Duration::from_millis(2000);

/// Knobs for one traversal run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalOptions {
    /// Series name; derived from the start URL when `None`.
    pub series_name: Option<String>,
    /// Registry name of the capability to prefer, or `auto`.
    pub preferred_capability: String,
    pub start_season: u32,
    pub start_episode: u32,
    /// Stop after this many processed episodes.
    pub max_episodes: Option<usize>,
    /// Stop once this many episodes in a row yield no links or fail.
    pub max_consecutive_errors: usize,
    pub delay_between_episodes: Duration,
    pub delay_after_error: Duration,
    /// Keep walking after a discovery fault instead of aborting.
    pub continue_on_error: bool,
    /// Skip discovery for episodes that already have links.
    pub skip_existing: bool,
    /// Drop stored links and rediscover; wins over `skip_existing`.
    pub force_rescrape: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            series_name: None,
            preferred_capability: AUTO.to_string(),
            start_season: 1,
            start_episode: 1,
            max_episodes: None,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            delay_between_episodes: DEFAULT_DELAY_BETWEEN_EPISODES,
            delay_after_error: DEFAULT_DELAY_AFTER_ERROR,
            continue_on_error: true,
            skip_existing: false,
            force_rescrape: false,
        }
    }
}

impl TraversalOptions {
    /// Options with no pauses, for tests and batch runs.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.delay_between_episodes = Duration::ZERO;
        self.delay_after_error = Duration::ZERO;
        self
    }

    /// Checks the options before a run starts.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::InvalidOptions`] for zero start numbers,
    /// a zero error threshold, a zero episode limit or a blank series name.
    pub fn validate(&self) -> Result<(), TraversalError> {
        let invalid = |message: &str| {
            Err(TraversalError::InvalidOptions {
                message: message.to_string(),
            })
        };

        if self.start_season == 0 || self.start_episode == 0 {
            return invalid("start season and episode must be at least 1");
        }
        if self.max_consecutive_errors == 0 {
            return invalid("max consecutive errors must be at least 1");
        }
        if self.max_episodes == Some(0) {
            return invalid("max episodes must be at least 1 when set");
        }
        if self
            .series_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return invalid("series name must not be blank");
        }
        Ok(())
    }

    /// Whether stored links should be skipped for an episode.
    #[must_use]
    pub fn skips_existing(&self) -> bool {
        self.skip_existing && !self.force_rescrape
    }
}
