//! Link validation pass: re-checks stored links through their discovery
//! capability and records the verdict.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{Catalog, CatalogError, DownloadableLink};
use crate::discovery::registry::AUTO;
use crate::discovery::{DiscoveryError, DiscoveryRegistry, LinkDiscovery};

/// Default number of links checked concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default per-link check ceiling.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that stop the validation pass.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid validation options: {message}")]
    InvalidOptions { message: String },

    #[error("discovery capability failed to start: {0}")]
    Initialization(#[source] DiscoveryError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Knobs for a validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Restrict to one series (name or clean name).
    pub series: Option<String>,
    /// Re-check links that were already tested.
    pub force: bool,
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            series: None,
            force: false,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }
}

/// Outcome counts of a validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Links that got a verdict.
    pub checked: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Checks that errored or timed out; the link is left untested.
    pub failed: usize,
    /// Links no registered capability can handle.
    pub unsupported: usize,
}

enum Verdict {
    Valid,
    Invalid(String),
    Failed(String),
}

/// Checks stored links and records `is_valid`/`is_tested`/`last_validated`.
///
/// Capabilities are initialized on first use and cleaned up at the end.
///
/// # Errors
///
/// Returns [`ValidationError`] for invalid options, a capability that cannot
/// start, or catalog failures. Individual link failures are only counted.
#[instrument(skip(catalog, registry, options), fields(series = ?options.series, force = options.force))]
pub async fn validate_links(
    catalog: &Catalog,
    registry: &DiscoveryRegistry,
    options: &ValidationOptions,
) -> Result<ValidationSummary, ValidationError> {
    if options.batch_size == 0 {
        return Err(ValidationError::InvalidOptions {
            message: "batch size must be at least 1".to_string(),
        });
    }
    if options.timeout.is_zero() {
        return Err(ValidationError::InvalidOptions {
            message: "timeout must be positive".to_string(),
        });
    }

    let links = catalog
        .links_for_validation(options.series.as_deref(), options.force)
        .await?;
    info!(links = links.len(), "validating links");

    let mut active: HashMap<String, Arc<dyn LinkDiscovery>> = HashMap::new();
    let outcome = check_all(catalog, registry, options, &links, &mut active).await;

    for capability in active.values() {
        capability.cleanup().await;
    }

    let summary = outcome?;
    info!(
        checked = summary.checked,
        valid = summary.valid,
        invalid = summary.invalid,
        failed = summary.failed,
        unsupported = summary.unsupported,
        "validation complete"
    );
    Ok(summary)
}

async fn check_all(
    catalog: &Catalog,
    registry: &DiscoveryRegistry,
    options: &ValidationOptions,
    links: &[DownloadableLink],
    active: &mut HashMap<String, Arc<dyn LinkDiscovery>>,
) -> Result<ValidationSummary, ValidationError> {
    let mut summary = ValidationSummary::default();

    for batch in links.chunks(options.batch_size) {
        let mut checks = JoinSet::new();

        for link in batch {
            let Some(capability) = registry.find_best(&link.url, AUTO) else {
                debug!(link_id = link.id, url = %link.url, "no capability for link");
                summary.unsupported += 1;
                continue;
            };
            let key = capability.name().to_ascii_lowercase();
            if !active.contains_key(&key) {
                capability
                    .initialize()
                    .await
                    .map_err(ValidationError::Initialization)?;
                active.insert(key, Arc::clone(&capability));
            }

            let link_id = link.id;
            let url = link.url.clone();
            let timeout = options.timeout;
            checks.spawn(async move {
                let verdict = match tokio::time::timeout(timeout, capability.validate_link(&url)).await
                {
                    Ok(Ok(true)) => Verdict::Valid,
                    Ok(Ok(false)) => Verdict::Invalid("link did not answer with success".to_string()),
                    Ok(Err(e)) => Verdict::Failed(e.to_string()),
                    Err(_) => Verdict::Failed(format!("check timed out after {}s", timeout.as_secs())),
                };
                (link_id, verdict)
            });
        }

        while let Some(joined) = checks.join_next().await {
            let (link_id, verdict) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "validation task panicked");
                    summary.failed += 1;
                    continue;
                }
            };
            match verdict {
                Verdict::Valid => {
                    catalog.mark_link_validated(link_id, true, None).await?;
                    summary.checked += 1;
                    summary.valid += 1;
                }
                Verdict::Invalid(reason) => {
                    catalog
                        .mark_link_validated(link_id, false, Some(&reason))
                        .await?;
                    summary.checked += 1;
                    summary.invalid += 1;
                }
                Verdict::Failed(reason) => {
                    warn!(link_id, error = %reason, "link check failed");
                    summary.failed += 1;
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::catalog::{LinkCandidate, LinkType};
    use crate::discovery::EpisodeContext;

    /// Accepts links whose URL contains "good"; errors on "broken".
    struct Checker;

    #[async_trait]
    impl LinkDiscovery for Checker {
        fn name(&self) -> &str {
            "checker"
        }

        fn can_handle(&self, url: &str) -> bool {
            url.starts_with("https://")
        }

        async fn initialize(&self) -> Result<(), DiscoveryError> {
            Ok(())
        }

        async fn extract_links(
            &self,
            _: &str,
            _: &EpisodeContext,
        ) -> Result<Vec<LinkCandidate>, DiscoveryError> {
            Ok(Vec::new())
        }

        async fn validate_link(&self, url: &str) -> Result<bool, DiscoveryError> {
            if url.contains("broken") {
                return Err(DiscoveryError::navigation(url, "connection reset"));
            }
            Ok(url.contains("good"))
        }

        async fn cleanup(&self) {}
    }

    async fn seeded_catalog() -> Catalog {
        let catalog = Catalog::new(crate::Database::new_in_memory().await.unwrap());
        let series = catalog.get_or_create_series("Show", "Show", "u").await.unwrap();
        let season = catalog.get_or_create_season(series.id, 1).await.unwrap();
        let episode = catalog.get_or_create_episode(&season, 1, None).await.unwrap();
        catalog
            .add_links_if_absent(
                episode.id,
                &[
                    LinkCandidate::new("https://h/good.mp4", "h", LinkType::MP4),
                    LinkCandidate::new("https://h/bad.mp4", "h", LinkType::MP4),
                    LinkCandidate::new("https://h/broken.mp4", "h", LinkType::MP4),
                    LinkCandidate::new("ftp://h/other.mp4", "h", LinkType::MP4),
                ],
            )
            .await
            .unwrap();
        catalog
    }

    #[tokio::test]
    async fn test_validate_links_records_verdicts() {
        let catalog = seeded_catalog().await;
        let mut registry = DiscoveryRegistry::new();
        registry.register(Arc::new(Checker));

        let options = ValidationOptions {
            batch_size: 2,
            ..ValidationOptions::default()
        };
        let summary = validate_links(&catalog, &registry, &options).await.unwrap();

        assert_eq!(
            summary,
            ValidationSummary {
                checked: 2,
                valid: 1,
                invalid: 1,
                failed: 1,
                unsupported: 1,
            }
        );

        // Tested links are not picked up again without force
        let again = validate_links(&catalog, &registry, &options).await.unwrap();
        assert_eq!(again.checked, 0);
        assert_eq!(again.failed, 1);

        let stats = catalog.statistics().await.unwrap();
        assert_eq!(stats.valid_links, 3);
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let catalog = seeded_catalog().await;
        let options = ValidationOptions {
            batch_size: 0,
            ..ValidationOptions::default()
        };
        assert!(matches!(
            validate_links(&catalog, &DiscoveryRegistry::new(), &options).await,
            Err(ValidationError::InvalidOptions { .. })
        ));
    }
}
