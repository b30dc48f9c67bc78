//! Integration tests for the HTTP page discovery capability against a local
//! mock server.

use std::sync::Arc;
use std::time::Duration;

use harvester_core::catalog::{EpisodeStatus, LinkType};
use harvester_core::discovery::{EpisodeContext, HttpDiscoveryConfig};
use harvester_core::{
    DiscoveryError, DiscoveryRegistry, HttpPageDiscovery, LinkDiscovery, StopReason,
    TraversalEngine, TraversalOptions,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::{start_mock_server_or_skip, temp_catalog};

const EPISODE_PATH: &str = "/serie/stream/my-show/staffel-1/episode-";

fn context(episode: u32) -> EpisodeContext {
    EpisodeContext {
        series_name: "My Show".to_string(),
        season: 1,
        episode,
        episode_id: i64::from(episode),
    }
}

fn player_page(id: &str) -> String {
    format!(
        r#"<html><body>
             <iframe src="https://vidmoly.to/embed-{id}.html"></iframe>
             <script>var hls = "https://cdn.example.net/{id}/master.m3u8";</script>
           </body></html>"#
    )
}

async fn initialized(config: HttpDiscoveryConfig) -> HttpPageDiscovery {
    let discovery = HttpPageDiscovery::new(config);
    discovery.initialize().await.unwrap();
    discovery
}

#[tokio::test]
async fn test_extracts_links_from_served_page() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path(format!("{EPISODE_PATH}1")))
        .and(header("user-agent", "harvester-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(player_page("abc")))
        .expect(1)
        .mount(&server)
        .await;

    let discovery = initialized(HttpDiscoveryConfig {
        user_agent: "harvester-test/1.0".to_string(),
        ..HttpDiscoveryConfig::default()
    })
    .await;
    let url = format!("{}{EPISODE_PATH}1", server.uri());

    let links = discovery.extract_links(&url, &context(1)).await.unwrap();

    assert_eq!(links.len(), 2);
    assert_eq!(links[0].url, "https://vidmoly.to/embed-abc.html");
    assert_eq!(links[0].host_name, "vidmoly.to");
    assert_eq!(links[0].link_type, LinkType::Embed);
    assert_eq!(links[1].host_name, "cdn.example.net");
    assert_eq!(links[1].link_type, LinkType::M3U8);
}

#[tokio::test]
async fn test_missing_page_yields_no_links() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let discovery = initialized(HttpDiscoveryConfig::default()).await;
    let url = format!("{}{EPISODE_PATH}9", server.uri());

    let links = discovery.extract_links(&url, &context(9)).await.unwrap();

    assert!(links.is_empty());
}

#[tokio::test]
async fn test_server_error_is_a_fault() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let discovery = initialized(HttpDiscoveryConfig::default()).await;
    let url = format!("{}{EPISODE_PATH}1", server.uri());

    let err = discovery.extract_links(&url, &context(1)).await.unwrap_err();

    assert!(
        matches!(err, DiscoveryError::HttpStatus { status: 503, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_slow_page_is_a_timeout() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(player_page("slow"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let discovery = initialized(HttpDiscoveryConfig {
        page_load_timeout: Duration::from_millis(200),
        ..HttpDiscoveryConfig::default()
    })
    .await;
    let url = format!("{}{EPISODE_PATH}1", server.uri());

    let err = discovery.extract_links(&url, &context(1)).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_next_episode_reuses_loaded_page() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let html = format!(
        r#"{}<a href="{EPISODE_PATH}2">next</a>"#,
        player_page("abc")
    );
    Mock::given(method("GET"))
        .and(path(format!("{EPISODE_PATH}1")))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .expect(1)
        .mount(&server)
        .await;

    let discovery = initialized(HttpDiscoveryConfig::default()).await;
    let url = format!("{}{EPISODE_PATH}1", server.uri());

    discovery.extract_links(&url, &context(1)).await.unwrap();
    let next = discovery.next_episode_url(&url).await.unwrap();

    assert_eq!(next, Some(format!("{}{EPISODE_PATH}2", server.uri())));
}

#[tokio::test]
async fn test_validate_link_uses_head_status() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("HEAD"))
        .and(path("/alive"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let discovery = initialized(HttpDiscoveryConfig::default()).await;

    assert!(
        discovery
            .validate_link(&format!("{}/alive", server.uri()))
            .await
            .unwrap()
    );
    assert!(
        !discovery
            .validate_link(&format!("{}/gone", server.uri()))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_cleanup_releases_client() {
    let discovery = initialized(HttpDiscoveryConfig::default()).await;
    discovery.cleanup().await;

    let err = discovery
        .validate_link("https://vidmoly.to/embed-abc.html")
        .await
        .unwrap_err();

    assert!(matches!(err, DiscoveryError::Initialization { .. }));
}

#[tokio::test]
async fn test_traversal_over_http_pages() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    for (episode, id) in [(1, "one"), (2, "two")] {
        Mock::given(method("GET"))
            .and(path(format!("{EPISODE_PATH}{episode}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(player_page(id)))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut registry = DiscoveryRegistry::new();
    registry.register(Arc::new(HttpPageDiscovery::new(HttpDiscoveryConfig::default())));
    let engine = TraversalEngine::new(Arc::new(registry));
    let (catalog, _dir) = temp_catalog().await;
    let options = TraversalOptions {
        max_consecutive_errors: 2,
        ..TraversalOptions::default().without_delays()
    };

    let result = engine
        .run(&catalog, &format!("{}{EPISODE_PATH}1", server.uri()), &options)
        .await
        .unwrap();

    assert_eq!(result.series_name, "My Show");
    assert_eq!(result.processed_episodes, 4);
    assert_eq!(result.total_links_found, 4);
    assert_eq!(result.stop_reason, Some(StopReason::ConsecutiveErrors));
    assert_eq!(result.host_statistics.get("vidmoly.to"), Some(&2));

    let overview = catalog.episode_overview(result.series_id).await.unwrap();
    let statuses: Vec<EpisodeStatus> = overview.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            EpisodeStatus::LinksFound,
            EpisodeStatus::LinksFound,
            EpisodeStatus::NoLinksFound,
            EpisodeStatus::NoLinksFound,
        ]
    );
}
