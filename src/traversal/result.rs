//! Traversal run summary.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::catalog::LinkCandidate;

/// Why a traversal run stopped walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Too many episodes in a row yielded no links or failed.
    ConsecutiveErrors,
    /// The episode limit was reached.
    EpisodeLimit,
    /// No next episode URL could be obtained.
    EndOfSeries,
    /// The interrupt flag was set.
    Cancelled,
}

impl StopReason {
    /// Stable label for logs and summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConsecutiveErrors => "consecutive_errors",
            Self::EpisodeLimit => "episode_limit",
            Self::EndOfSeries => "end_of_series",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a traversal run did.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalResult {
    pub series_id: i64,
    pub series_name: String,
    pub start_url: String,
    /// Episodes that went through discovery (found, empty or faulted).
    pub processed_episodes: usize,
    /// Episodes skipped because they already had links.
    pub skipped_episodes: usize,
    /// Newly stored links.
    pub total_links_found: usize,
    /// Episodes that yielded no links or faulted.
    pub total_errors: usize,
    /// Fault messages in the order they happened.
    pub error_messages: Vec<String>,
    /// Newly stored links per host.
    pub host_statistics: BTreeMap<String, usize>,
    pub stop_reason: Option<StopReason>,
    pub started_at: SystemTime,
    pub finished_at: Option<SystemTime>,
    pub duration: Duration,
}

impl TraversalResult {
    pub(crate) fn new(series_id: i64, series_name: &str, start_url: &str) -> Self {
        Self {
            series_id,
            series_name: series_name.to_string(),
            start_url: start_url.to_string(),
            processed_episodes: 0,
            skipped_episodes: 0,
            total_links_found: 0,
            total_errors: 0,
            error_messages: Vec::new(),
            host_statistics: BTreeMap::new(),
            stop_reason: None,
            started_at: SystemTime::now(),
            finished_at: None,
            duration: Duration::ZERO,
        }
    }

    pub(crate) fn record_new_links(&mut self, links: &[LinkCandidate]) {
        self.total_links_found += links.len();
        for link in links {
            *self
                .host_statistics
                .entry(link.host_name.clone())
                .or_default() += 1;
        }
    }

    pub(crate) fn record_error(&mut self, message: Option<String>) {
        self.total_errors += 1;
        if let Some(message) = message {
            self.error_messages.push(message);
        }
    }

    pub(crate) fn finish(&mut self, reason: Option<StopReason>) {
        self.stop_reason = reason;
        let now = SystemTime::now();
        self.duration = now.duration_since(self.started_at).unwrap_or_default();
        self.finished_at = Some(now);
    }

    /// Percentage of processed episodes without an error; 0 when nothing
    /// was processed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.processed_episodes == 0 {
            return 0.0;
        }
        let good = self.processed_episodes.saturating_sub(self.total_errors);
        good as f64 / self.processed_episodes as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LinkType;

    #[test]
    fn test_success_rate() {
        let mut result = TraversalResult::new(1, "Show", "u");
        assert!(result.success_rate().abs() < f64::EPSILON);

        result.processed_episodes = 5;
        result.total_errors = 2;
        assert!((result.success_rate() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_new_links_counts_hosts() {
        let mut result = TraversalResult::new(1, "Show", "u");
        result.record_new_links(&[
            LinkCandidate::new("https://a/1", "a", LinkType::Embed),
            LinkCandidate::new("https://a/2", "a", LinkType::Embed),
            LinkCandidate::new("https://b/1", "b", LinkType::MP4),
        ]);
        assert_eq!(result.total_links_found, 3);
        assert_eq!(result.host_statistics.get("a"), Some(&2));
        assert_eq!(result.host_statistics.get("b"), Some(&1));
    }

    #[test]
    fn test_record_error_without_message() {
        let mut result = TraversalResult::new(1, "Show", "u");
        result.record_error(None);
        result.record_error(Some("S1E2: boom".to_string()));
        assert_eq!(result.total_errors, 2);
        assert_eq!(result.error_messages, vec!["S1E2: boom".to_string()]);
    }

    #[test]
    fn test_finish_sets_reason_and_timestamp() {
        let mut result = TraversalResult::new(1, "Show", "u");
        result.finish(Some(StopReason::EndOfSeries));
        assert_eq!(result.stop_reason, Some(StopReason::EndOfSeries));
        assert!(result.finished_at.is_some());
    }
}
