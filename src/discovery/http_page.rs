//! Discovery capability that fetches episode pages over HTTP and scans the
//! returned HTML for playable links.
//!
//! Recognised shapes:
//! - `<iframe src=...>` players and `/embed-...` URLs → [`LinkType::Embed`]
//! - HLS playlists (`.m3u8`) → [`LinkType::M3U8`]
//! - progressive files (`.mp4`) → [`LinkType::MP4`]
//!
//! The HTTP client is the capability's rendering resource: it is built in
//! `initialize` and dropped in `cleanup`.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Proxy, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use super::url_pattern::{episode_from_url, season_from_url};
use super::{DiscoveryError, EpisodeContext, LinkDiscovery, host_of};
use crate::catalog::{LinkCandidate, LinkType};
use crate::user_agent;

/// Registry name of the built-in capability.
pub const HTTP_PAGE_CAPABILITY: &str = "http";

const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 10;

#[allow(clippy::expect_used)]
static IFRAME_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<iframe[^>]*\ssrc\s*=\s*["']([^"']+)["']"#).expect("iframe regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static EMBED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>\\]+/embed[-/][^\s"'<>\\]+"#).expect("embed regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static M3U8_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>\\]+\.m3u8(?:\?[^\s"'<>\\]*)?"#).expect("m3u8 regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static MP4_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>\\]+\.mp4(?:\?[^\s"'<>\\]*)?"#).expect("mp4 regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#).expect("anchor regex is valid") // Static pattern, safe to panic
});

/// Settings for [`HttpPageDiscovery`].
#[derive(Debug, Clone)]
pub struct HttpDiscoveryConfig {
    /// Registry name.
    pub name: String,
    /// Sent with every request.
    pub user_agent: String,
    /// Ceiling for a single page load.
    pub page_load_timeout: Duration,
    /// Optional HTTP(S) proxy URL.
    pub proxy: Option<String>,
    /// Site domains this capability accepts; empty accepts any http(s) URL.
    pub domains: Vec<String>,
}

impl Default for HttpDiscoveryConfig {
    fn default() -> Self {
        Self {
            name: HTTP_PAGE_CAPABILITY.to_string(),
            user_agent: user_agent::default_user_agent(),
            page_load_timeout: Duration::from_secs(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
            proxy: None,
            domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct FetchedPage {
    url: String,
    html: String,
}

/// HTML-scanning discovery capability.
#[derive(Debug)]
pub struct HttpPageDiscovery {
    config: HttpDiscoveryConfig,
    client: Mutex<Option<Client>>,
    last_page: Mutex<Option<FetchedPage>>,
}

impl HttpPageDiscovery {
    /// Creates the capability; no network resources are held until `initialize`.
    #[must_use]
    pub fn new(config: HttpDiscoveryConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            last_page: Mutex::new(None),
        }
    }

    fn build_client(&self) -> Result<Client, DiscoveryError> {
        let mut builder = Client::builder()
            .connect_timeout(self.config.page_load_timeout)
            .timeout(self.config.page_load_timeout)
            .user_agent(self.config.user_agent.clone())
            .cookie_store(true)
            .gzip(true);

        if let Some(proxy) = &self.config.proxy {
            let proxy = Proxy::all(proxy).map_err(|e| self.init_error(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| self.init_error(format!("HTTP client construction failed: {e}")))
    }

    fn init_error(&self, message: String) -> DiscoveryError {
        DiscoveryError::Initialization {
            capability: self.config.name.clone(),
            message,
        }
    }

    async fn client(&self) -> Result<Client, DiscoveryError> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| self.init_error("not initialized".to_string()))
    }

    /// Loads a page; `Ok(None)` means the page does not exist.
    async fn fetch_page(&self, url: &str) -> Result<Option<String>, DiscoveryError> {
        let client = self.client().await?;
        let response = client.get(url).send().await.map_err(|e| request_error(url, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            debug!(url, status = status.as_u16(), "episode page not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(DiscoveryError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| request_error(url, &e))?;
        *self.last_page.lock().await = Some(FetchedPage {
            url: url.to_string(),
            html: html.clone(),
        });
        Ok(Some(html))
    }

    async fn cached_or_fetched(&self, url: &str) -> Result<Option<String>, DiscoveryError> {
        if let Some(page) = self.last_page.lock().await.as_ref()
            && page.url == url
        {
            return Ok(Some(page.html.clone()));
        }
        self.fetch_page(url).await
    }

    fn host_or_default(&self, url: &str) -> String {
        host_of(url).unwrap_or_else(|| self.config.name.clone())
    }
}

fn request_error(url: &str, error: &reqwest::Error) -> DiscoveryError {
    if error.is_timeout() {
        DiscoveryError::Timeout {
            url: url.to_string(),
        }
    } else {
        DiscoveryError::navigation(url, error)
    }
}

/// Scans page HTML for candidate links, resolving relative iframe sources
/// against `page_url`. Order of first appearance is kept; duplicates dropped.
#[must_use]
pub fn scan_links(page_url: &str, html: &str) -> Vec<(String, LinkType)> {
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    let mut push = |url: String, link_type: LinkType| {
        if seen.insert(url.clone()) {
            found.push((url, link_type));
        }
    };

    for captures in IFRAME_SRC.captures_iter(html) {
        let src = &captures[1];
        let resolved = match &base {
            Some(base) => base.join(src).map(String::from).ok(),
            None => Url::parse(src).map(String::from).ok(),
        };
        if let Some(url) = resolved.filter(|u| u.starts_with("http")) {
            push(url, LinkType::Embed);
        }
    }
    for m in EMBED_URL.find_iter(html) {
        push(m.as_str().to_string(), LinkType::Embed);
    }
    for m in M3U8_URL.find_iter(html) {
        push(m.as_str().to_string(), LinkType::M3U8);
    }
    for m in MP4_URL.find_iter(html) {
        push(m.as_str().to_string(), LinkType::MP4);
    }

    found
}

/// Picks the anchor on a page that leads to the episode after `current_url`:
/// the same season's next episode, else the next season's first episode.
#[must_use]
pub fn next_episode_anchor(current_url: &str, html: &str) -> Option<String> {
    let base = Url::parse(current_url).ok()?;
    let episode = episode_from_url(current_url)?;
    let season = season_from_url(current_url);

    let candidates: Vec<String> = ANCHOR_HREF
        .captures_iter(html)
        .filter_map(|captures| base.join(&captures[1]).ok())
        .map(String::from)
        .filter(|href| href != current_url)
        .collect();

    let same_season = candidates.iter().find(|href| {
        episode_from_url(href) == Some(episode + 1) && season_from_url(href) == season
    });
    if let Some(href) = same_season {
        return Some(href.clone());
    }

    let next_season = season? + 1;
    candidates
        .into_iter()
        .find(|href| season_from_url(href) == Some(next_season) && episode_from_url(href) == Some(1))
}

#[async_trait]
impl LinkDiscovery for HttpPageDiscovery {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn can_handle(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        if self.config.domains.is_empty() {
            return true;
        }
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        self.config.domains.iter().any(|domain| {
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }

    #[instrument(skip(self), fields(capability = %self.config.name))]
    async fn initialize(&self) -> Result<(), DiscoveryError> {
        let client = self.build_client()?;
        *self.client.lock().await = Some(client);
        debug!("http discovery initialized");
        Ok(())
    }

    #[instrument(skip(self, context), fields(season = context.season, episode = context.episode))]
    async fn extract_links(
        &self,
        episode_url: &str,
        context: &EpisodeContext,
    ) -> Result<Vec<LinkCandidate>, DiscoveryError> {
        let Some(html) = self.fetch_page(episode_url).await? else {
            return Ok(Vec::new());
        };

        let links: Vec<LinkCandidate> = scan_links(episode_url, &html)
            .into_iter()
            .map(|(url, link_type)| {
                let host = self.host_or_default(&url);
                LinkCandidate::new(url, host, link_type)
            })
            .collect();

        debug!(count = links.len(), "scanned episode page");
        Ok(links)
    }

    #[instrument(skip(self))]
    async fn next_episode_url(&self, current_url: &str) -> Result<Option<String>, DiscoveryError> {
        let Some(html) = self.cached_or_fetched(current_url).await? else {
            return Ok(None);
        };
        Ok(next_episode_anchor(current_url, &html))
    }

    #[instrument(skip(self))]
    async fn validate_link(&self, url: &str) -> Result<bool, DiscoveryError> {
        let client = self.client().await?;
        let response = client
            .head(url)
            .send()
            .await
            .map_err(|e| request_error(url, &e))?;
        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            warn!(url, status = status.as_u16(), "link failed validation");
        }
        Ok(status.is_success() || status.is_redirection())
    }

    async fn cleanup(&self) {
        self.client.lock().await.take();
        self.last_page.lock().await.take();
        debug!(capability = %self.config.name, "http discovery released");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_links_classifies_and_dedupes() {
        let html = r#"
            <iframe src="https://vidmoly.to/embed-abc123.html"></iframe>
            <script>var src = "https://cdn.example.net/hls/master.m3u8?token=1";</script>
            <a href="https://vidmoly.to/embed-abc123.html">mirror</a>
            <video src="https://files.example.net/ep1.mp4"></video>
        "#;

        let links = scan_links("https://s.to/serie/stream/show/staffel-1/episode-1", html);
        assert_eq!(
            links,
            vec![
                ("https://vidmoly.to/embed-abc123.html".to_string(), LinkType::Embed),
                ("https://cdn.example.net/hls/master.m3u8?token=1".to_string(), LinkType::M3U8),
                ("https://files.example.net/ep1.mp4".to_string(), LinkType::MP4),
            ]
        );
    }

    #[test]
    fn test_scan_links_resolves_relative_iframe() {
        let links = scan_links(
            "https://s.to/serie/stream/show/staffel-1/episode-1",
            r#"<iframe width="100%" src="/player/42"></iframe>"#,
        );
        assert_eq!(
            links,
            vec![("https://s.to/player/42".to_string(), LinkType::Embed)]
        );
    }

    #[test]
    fn test_scan_links_empty_page() {
        assert!(scan_links("https://h/episode-1", "<html></html>").is_empty());
    }

    #[test]
    fn test_next_episode_anchor_same_season() {
        let html = r#"<a href="/serie/stream/show/staffel-1/episode-1">1</a>
                      <a href="/serie/stream/show/staffel-1/episode-2">2</a>"#;
        assert_eq!(
            next_episode_anchor("https://s.to/serie/stream/show/staffel-1/episode-1", html).as_deref(),
            Some("https://s.to/serie/stream/show/staffel-1/episode-2")
        );
    }

    #[test]
    fn test_next_episode_anchor_crosses_season() {
        let html = r#"<a href="/serie/stream/show/staffel-2/episode-1">S2</a>"#;
        assert_eq!(
            next_episode_anchor("https://s.to/serie/stream/show/staffel-1/episode-8", html).as_deref(),
            Some("https://s.to/serie/stream/show/staffel-2/episode-1")
        );
    }

    #[test]
    fn test_next_episode_anchor_none_on_last_page() {
        let html = r#"<a href="/serie/stream/show/staffel-1/episode-7">prev</a>"#;
        assert_eq!(
            next_episode_anchor("https://s.to/serie/stream/show/staffel-1/episode-8", html),
            None
        );
    }

    #[test]
    fn test_can_handle_respects_domains() {
        let discovery = HttpPageDiscovery::new(HttpDiscoveryConfig {
            domains: vec!["s.to".to_string()],
            ..HttpDiscoveryConfig::default()
        });
        assert!(discovery.can_handle("https://s.to/serie/stream/show"));
        assert!(discovery.can_handle("https://www.s.to/serie/stream/show"));
        assert!(!discovery.can_handle("https://aniworld.to/anime/stream/show"));
        assert!(!discovery.can_handle("ftp://s.to/file"));
    }

    #[tokio::test]
    async fn test_extract_before_initialize_is_initialization_error() {
        let discovery = HttpPageDiscovery::new(HttpDiscoveryConfig::default());
        let context = EpisodeContext {
            series_name: "Show".to_string(),
            season: 1,
            episode: 1,
            episode_id: 1,
        };
        let err = discovery
            .extract_links("https://s.to/episode-1", &context)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Initialization { .. }));
    }
}
