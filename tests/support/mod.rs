//! Shared helpers for integration tests: on-disk catalogs, a scripted
//! discovery capability, a fake downloader and the localhost socket guard.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::TcpListener;
use std::panic::Location;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use harvester_core::catalog::{LinkCandidate, LinkType};
use harvester_core::discovery::{EpisodeContext, host_of};
use harvester_core::download::DownloaderError;
use harvester_core::{Catalog, Database, DiscoveryError, ExternalDownloader, LinkDiscovery};
use tempfile::TempDir;
use wiremock::MockServer;

pub const STUB_HOST: &str = "https://stub.test";

/// Catalog over a fresh SQLite file; keep the `TempDir` alive.
pub async fn temp_catalog() -> (Catalog, TempDir) {
    let temp_dir = TempDir::new().expect("create temp dir");
    let db = Database::new(&temp_dir.path().join("catalog.db"))
        .await
        .expect("open catalog");
    (Catalog::new(db), temp_dir)
}

/// Stores `urls` for one episode, creating the hierarchy as needed.
pub async fn seed_links(
    catalog: &Catalog,
    series: &str,
    season: u32,
    episode: u32,
    urls: &[&str],
) -> i64 {
    let series = catalog
        .get_or_create_series(series, series, &format!("{STUB_HOST}/serie/{series}"))
        .await
        .expect("series");
    let season = catalog
        .get_or_create_season(series.id, season)
        .await
        .expect("season");
    let episode = catalog
        .get_or_create_episode(&season, episode, None)
        .await
        .expect("episode");
    let candidates: Vec<LinkCandidate> = urls
        .iter()
        .map(|url| LinkCandidate::new(*url, host_of(url).unwrap_or_default(), LinkType::Embed))
        .collect();
    catalog
        .add_links_if_absent(episode.id, &candidates)
        .await
        .expect("links");
    episode.id
}

/// `https://stub.test/serie/<slug>/staffel-<s>/episode-<e>`
pub fn episode_url(slug: &str, season: u32, episode: u32) -> String {
    format!("{STUB_HOST}/serie/{slug}/staffel-{season}/episode-{episode}")
}

// ==================== Discovery stub ====================

/// What the stub answers for one episode page.
#[derive(Debug, Clone)]
pub enum Page {
    Links(Vec<String>),
    Empty,
    Fault,
}

/// Discovery capability answering from a script keyed by page URL.
/// Unknown pages are empty. Pages without a scripted next link fall back to
/// the URL rewrite.
#[derive(Debug, Default)]
pub struct StubDiscovery {
    pages: Mutex<HashMap<String, Page>>,
    next_links: HashMap<String, String>,
    fail_initialize: bool,
    pub initialized: AtomicUsize,
    pub extracted: AtomicUsize,
    pub cleaned_up: AtomicUsize,
}

impl StubDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: impl Into<String>, page: Page) -> Self {
        self.set_page(url, page);
        self
    }

    /// Replaces the script for one page between runs.
    pub fn set_page(&self, url: impl Into<String>, page: Page) {
        self.pages
            .lock()
            .expect("pages lock")
            .insert(url.into(), page);
    }

    /// The page at `from` links to `to` as its next episode.
    pub fn next(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.next_links.insert(from.into(), to.into());
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }
}

#[async_trait]
impl LinkDiscovery for StubDiscovery {
    fn name(&self) -> &str {
        "stub"
    }

    fn can_handle(&self, url: &str) -> bool {
        url.starts_with(STUB_HOST)
    }

    async fn initialize(&self) -> Result<(), DiscoveryError> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            return Err(DiscoveryError::Initialization {
                capability: "stub".to_string(),
                message: "no renderer".to_string(),
            });
        }
        Ok(())
    }

    async fn extract_links(
        &self,
        episode_url: &str,
        _context: &EpisodeContext,
    ) -> Result<Vec<LinkCandidate>, DiscoveryError> {
        self.extracted.fetch_add(1, Ordering::SeqCst);
        let page = self
            .pages
            .lock()
            .expect("pages lock")
            .get(episode_url)
            .cloned()
            .unwrap_or(Page::Empty);
        match page {
            Page::Links(urls) => Ok(urls
                .iter()
                .map(|url| {
                    LinkCandidate::new(url.as_str(), host_of(url).unwrap_or_default(), LinkType::Embed)
                })
                .collect()),
            Page::Empty => Ok(Vec::new()),
            Page::Fault => Err(DiscoveryError::Timeout {
                url: episode_url.to_string(),
            }),
        }
    }

    async fn next_episode_url(&self, current_url: &str) -> Result<Option<String>, DiscoveryError> {
        Ok(self.next_links.get(current_url).cloned())
    }

    async fn validate_link(&self, url: &str) -> Result<bool, DiscoveryError> {
        Ok(!url.contains("dead"))
    }

    async fn cleanup(&self) {
        self.cleaned_up.fetch_add(1, Ordering::SeqCst);
    }
}

// ==================== Downloader stub ====================

/// Fake downloader that writes `<template with %(ext)s = mp4>` and tracks
/// how many downloads ran at once.
#[derive(Debug, Default)]
pub struct StubDownloader {
    fail_urls: HashSet<String>,
    silent_urls: HashSet<String>,
    panic_urls: HashSet<String>,
    delay: Duration,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl StubDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exits non-zero for `url`.
    pub fn failing_for(mut self, url: &str) -> Self {
        self.fail_urls.insert(url.to_string());
        self
    }

    /// Reports success for `url` without writing a file.
    pub fn silent_for(mut self, url: &str) -> Self {
        self.silent_urls.insert(url.to_string());
        self
    }

    /// Panics inside the job for `url`.
    pub fn panicking_for(mut self, url: &str) -> Self {
        self.panic_urls.insert(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ExternalDownloader for StubDownloader {
    fn name(&self) -> &str {
        "stub"
    }

    async fn download(
        &self,
        url: &str,
        output_template: &Path,
        _quality: &str,
    ) -> Result<(), DownloaderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_urls.contains(url) {
            panic!("stub downloader crashed on {url}");
        }
        if self.fail_urls.contains(url) {
            return Err(DownloaderError::NonZeroExit {
                code: Some(1),
                stderr: "ERROR: video unavailable".to_string(),
            });
        }
        if self.silent_urls.contains(url) {
            return Ok(());
        }

        let target = output_template.to_string_lossy().replace("%(ext)s", "mp4");
        tokio::fs::write(&target, b"video")
            .await
            .map_err(DownloaderError::Wait)
    }
}

// ==================== Socket guard ====================

#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var("HARVESTER_REQUIRE_SOCKET_TESTS")
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}; wiremock-based test cannot run in this environment",
        location.file(),
        location.line()
    );
    if socket_tests_required() {
        panic!("{message}. Set HARVESTER_REQUIRE_SOCKET_TESTS=0 to allow local skip behavior.");
    }

    eprintln!(
        "{message}. Skipping test. Set HARVESTER_REQUIRE_SOCKET_TESTS=1 to fail-fast instead."
    );
    true
}

pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}
