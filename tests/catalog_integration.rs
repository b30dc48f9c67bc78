//! Integration tests for the catalog store on an on-disk SQLite file.

use std::collections::HashSet;
use std::time::Duration;

use harvester_core::catalog::{
    DownloadStatus, EpisodeStatus, LinkCandidate, LinkType, PendingLinkFilter, SeriesStatus,
};
use harvester_core::{Catalog, CatalogError, Database};

mod support;
use support::{seed_links, temp_catalog};

#[tokio::test]
async fn test_concurrent_get_or_create_series_yields_one_row() {
    let (catalog, _dir) = temp_catalog().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move {
            catalog
                .get_or_create_series("Show", "Show", "https://stub.test/serie/show")
                .await
                .unwrap()
                .id
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(catalog.statistics().await.unwrap().total_series, 1);
}

#[tokio::test]
async fn test_concurrent_episode_creation_within_series() {
    let (catalog, _dir) = temp_catalog().await;
    let series = catalog
        .get_or_create_series("Show", "Show", "https://stub.test/serie/show")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move {
            let season = catalog.get_or_create_season(series.id, 2).await.unwrap();
            catalog
                .get_or_create_episode(&season, 4, None)
                .await
                .unwrap()
                .id
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 1);
    let stats = catalog.statistics().await.unwrap();
    assert_eq!(stats.total_seasons, 1);
    assert_eq!(stats.total_episodes, 1);
}

#[tokio::test]
async fn test_series_lookup_matches_name_or_clean_name() {
    let (catalog, _dir) = temp_catalog().await;
    let created = catalog
        .get_or_create_series("Show: Part 1", "Show Part 1", "https://stub.test/serie/show")
        .await
        .unwrap();

    let by_clean = catalog
        .get_or_create_series("Show Part 1", "Show Part 1", "https://elsewhere")
        .await
        .unwrap();
    assert_eq!(by_clean.id, created.id);
    assert_eq!(by_clean.original_url, "https://stub.test/serie/show");
    assert_eq!(
        catalog.find_series("Show: Part 1").await.unwrap().unwrap().id,
        created.id
    );
    assert!(catalog.find_series("Other").await.unwrap().is_none());
}

#[tokio::test]
async fn test_links_are_unique_per_episode_and_url() {
    let (catalog, _dir) = temp_catalog().await;
    let episode_id = seed_links(
        &catalog,
        "Show",
        1,
        1,
        &["https://voe.sx/e/a", "https://voe.sx/e/a", "https://vidmoly.to/embed-b"],
    )
    .await;
    assert_eq!(catalog.episode_link_count(episode_id).await.unwrap(), 2);

    let again = vec![
        LinkCandidate::new("https://voe.sx/e/a", "voe.sx", LinkType::Embed),
        LinkCandidate::new("https://voe.sx/e/new", "voe.sx", LinkType::Embed),
    ];
    let inserted = catalog.insert_new_links(episode_id, &again).await.unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].url, "https://voe.sx/e/new");

    let urls: Vec<String> = catalog
        .links_for_episode(episode_id)
        .await
        .unwrap()
        .into_iter()
        .map(|link| link.url)
        .collect();
    assert_eq!(
        urls,
        vec!["https://voe.sx/e/a", "https://vidmoly.to/embed-b", "https://voe.sx/e/new"]
    );
}

#[tokio::test]
async fn test_same_url_may_belong_to_two_episodes() {
    let (catalog, _dir) = temp_catalog().await;
    let first = seed_links(&catalog, "Show", 1, 1, &["https://voe.sx/e/shared"]).await;
    let second = seed_links(&catalog, "Show", 1, 2, &["https://voe.sx/e/shared"]).await;

    assert_ne!(first, second);
    assert_eq!(catalog.statistics().await.unwrap().total_links, 2);
}

#[tokio::test]
async fn test_links_for_missing_episode_are_not_found() {
    let (catalog, _dir) = temp_catalog().await;
    let links = vec![LinkCandidate::new("https://voe.sx/e/a", "voe.sx", LinkType::Embed)];

    let err = catalog.add_links_if_absent(9_999, &links).await.unwrap_err();

    assert!(matches!(err, CatalogError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_pending_links_exclude_invalid_and_started() {
    let (catalog, _dir) = temp_catalog().await;
    let episode_id = seed_links(
        &catalog,
        "Show",
        1,
        1,
        &["https://voe.sx/e/ok", "https://voe.sx/e/dead", "https://voe.sx/e/done"],
    )
    .await;
    let links = catalog.links_for_episode(episode_id).await.unwrap();
    catalog
        .mark_link_validated(links[1].id, false, Some("HTTP 404"))
        .await
        .unwrap();
    catalog
        .update_link_download_status(links[2].id, DownloadStatus::Completed, None, Some("/x.mp4"))
        .await
        .unwrap();

    let pending = catalog
        .get_pending_download_links(&PendingLinkFilter::default())
        .await
        .unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].link.url, "https://voe.sx/e/ok");
    assert_eq!(pending[0].series_name, "Show");
    assert_eq!((pending[0].season_number, pending[0].episode_number), (1, 1));
}

#[tokio::test]
async fn test_pending_links_are_ordered_by_series_season_episode() {
    let (catalog, _dir) = temp_catalog().await;
    seed_links(&catalog, "Zeta", 1, 1, &["https://voe.sx/e/z"]).await;
    seed_links(&catalog, "Alpha", 2, 1, &["https://voe.sx/e/a21"]).await;
    seed_links(&catalog, "Alpha", 1, 3, &["https://voe.sx/e/a13"]).await;
    seed_links(&catalog, "Alpha", 1, 1, &["https://voe.sx/e/a11"]).await;

    let order: Vec<String> = catalog
        .get_pending_download_links(&PendingLinkFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.link.url)
        .collect();

    assert_eq!(
        order,
        vec![
            "https://voe.sx/e/a11",
            "https://voe.sx/e/a13",
            "https://voe.sx/e/a21",
            "https://voe.sx/e/z",
        ]
    );
}

#[tokio::test]
async fn test_download_status_transitions_stamp_times_and_keep_path() {
    let (catalog, _dir) = temp_catalog().await;
    let episode_id = seed_links(&catalog, "Show", 1, 1, &["https://voe.sx/e/a"]).await;
    let link_id = catalog.links_for_episode(episode_id).await.unwrap()[0].id;

    catalog
        .update_link_download_status(link_id, DownloadStatus::Downloading, None, None)
        .await
        .unwrap();
    let link = catalog.get_link(link_id).await.unwrap().unwrap();
    assert_eq!(link.download_status, DownloadStatus::Downloading);
    assert!(link.download_started.is_some());
    assert!(link.download_completed.is_none());

    catalog
        .update_link_download_status(link_id, DownloadStatus::Completed, None, Some("/out/a.mp4"))
        .await
        .unwrap();
    let link = catalog.get_link(link_id).await.unwrap().unwrap();
    assert_eq!(link.download_status, DownloadStatus::Completed);
    assert!(link.download_completed.is_some());
    assert_eq!(link.download_path.as_deref(), Some("/out/a.mp4"));
    assert_eq!(
        catalog
            .count_links_by_download_status(DownloadStatus::Completed)
            .await
            .unwrap(),
        1
    );

    let err = catalog
        .update_link_download_status(4_242, DownloadStatus::Failed, Some("x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }));
}

#[tokio::test]
async fn test_list_series_reports_child_counters() {
    let (catalog, _dir) = temp_catalog().await;
    seed_links(&catalog, "Show", 1, 1, &["https://voe.sx/e/1", "https://voe.sx/e/1b"]).await;
    let second = seed_links(&catalog, "Show", 2, 1, &["https://voe.sx/e/2"]).await;
    seed_links(&catalog, "Other", 1, 1, &["https://voe.sx/e/o"]).await;
    let link_id = catalog.links_for_episode(second).await.unwrap()[0].id;
    catalog
        .update_link_download_status(link_id, DownloadStatus::Completed, None, None)
        .await
        .unwrap();

    let all = catalog.list_series(None, None).await.unwrap();
    assert_eq!(all.len(), 2);
    let show = all.iter().find(|s| s.series.name == "Show").unwrap();
    assert_eq!(show.total_seasons, 2);
    assert_eq!(show.total_episodes, 2);
    assert_eq!(show.found_links, 3);
    assert_eq!(show.completed_downloads, 1);

    let other = catalog.find_series("Other").await.unwrap().unwrap();
    catalog
        .update_series_status(other.id, SeriesStatus::Completed, None)
        .await
        .unwrap();
    let processing = catalog
        .list_series(None, Some(SeriesStatus::Processing))
        .await
        .unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].series.name, "Show");

    let named = catalog.list_series(Some("Other"), None).await.unwrap();
    assert_eq!(named.len(), 1);
}

#[tokio::test]
async fn test_episode_status_records_processing_time_for_links_found() {
    let (catalog, _dir) = temp_catalog().await;
    let episode_id = seed_links(&catalog, "Show", 1, 1, &["https://voe.sx/e/1"]).await;
    let series = catalog.find_series("Show").await.unwrap().unwrap();

    catalog
        .update_episode_status(episode_id, EpisodeStatus::LinksFound, None)
        .await
        .unwrap();

    let episode = catalog.find_episode(series.id, 1, 1).await.unwrap().unwrap();
    assert_eq!(episode.status, EpisodeStatus::LinksFound);
    assert!(episode.processed_at.is_some());
}

#[tokio::test]
async fn test_export_rows_filter_by_series() {
    let (catalog, _dir) = temp_catalog().await;
    seed_links(&catalog, "Show", 1, 2, &["https://voe.sx/e/2"]).await;
    seed_links(&catalog, "Show", 1, 1, &["https://voe.sx/e/1"]).await;
    seed_links(&catalog, "Other", 1, 1, &["https://voe.sx/e/o"]).await;

    let rows = catalog.export_rows(Some("Show")).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].episode_number, 1);
    assert_eq!(rows[1].episode_number, 2);
    assert!(rows.iter().all(|r| r.series_name == "Show" && r.host_name == "voe.sx"));
    assert_eq!(catalog.export_rows(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_cleanup_empty_series_keeps_processing_and_populated() {
    let (catalog, _dir) = temp_catalog().await;
    let empty_done = catalog
        .get_or_create_series("Empty Done", "Empty Done", "https://stub.test/a")
        .await
        .unwrap();
    catalog
        .update_series_status(empty_done.id, SeriesStatus::Completed, None)
        .await
        .unwrap();
    catalog
        .get_or_create_series("Empty Running", "Empty Running", "https://stub.test/b")
        .await
        .unwrap();
    seed_links(&catalog, "Full", 1, 1, &["https://voe.sx/e/1"]).await;

    assert_eq!(catalog.count_empty_series().await.unwrap(), 1);
    assert_eq!(catalog.cleanup_empty_series().await.unwrap(), 1);

    assert!(catalog.find_series("Empty Done").await.unwrap().is_none());
    assert!(catalog.find_series("Empty Running").await.unwrap().is_some());
    assert!(catalog.find_series("Full").await.unwrap().is_some());
}

#[tokio::test]
async fn test_cleanup_respects_age_and_cascades() {
    let (catalog, _dir) = temp_catalog().await;
    let episode_id = seed_links(&catalog, "Broken", 1, 1, &["https://voe.sx/e/1"]).await;
    let broken = catalog.find_series("Broken").await.unwrap().unwrap();
    catalog
        .update_series_status(broken.id, SeriesStatus::Failed, Some("gone"))
        .await
        .unwrap();
    let keep_id = seed_links(&catalog, "Keep", 1, 1, &["https://voe.sx/e/dead"]).await;
    let dead = catalog.links_for_episode(keep_id).await.unwrap()[0].id;
    catalog
        .mark_link_validated(dead, false, Some("HTTP 404"))
        .await
        .unwrap();

    // Nothing is older than a day yet
    let day = Duration::from_secs(86_400);
    assert_eq!(catalog.count_failed_series(day).await.unwrap(), 0);
    assert_eq!(catalog.count_invalid_links(day).await.unwrap(), 0);

    // SQLite timestamps have second resolution
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    assert_eq!(catalog.count_failed_series(Duration::ZERO).await.unwrap(), 1);
    assert_eq!(catalog.cleanup_failed_series(Duration::ZERO).await.unwrap(), 1);
    assert!(catalog.get_series(broken.id).await.unwrap().is_none());
    assert_eq!(catalog.episode_link_count(episode_id).await.unwrap(), 0);

    assert_eq!(catalog.cleanup_invalid_links(Duration::ZERO).await.unwrap(), 1);
    assert_eq!(catalog.episode_link_count(keep_id).await.unwrap(), 0);
    assert!(catalog.find_series("Keep").await.unwrap().is_some());

    let stats = catalog.statistics().await.unwrap();
    assert_eq!(stats.total_series, 1);
    assert_eq!(stats.total_links, 0);
}

#[tokio::test]
async fn test_catalog_persists_across_reopen() {
    let (catalog, dir) = temp_catalog().await;
    seed_links(&catalog, "Show", 1, 1, &["https://voe.sx/e/1"]).await;
    catalog.database().clone().close().await;

    let reopened = Catalog::new(Database::new(&dir.path().join("catalog.db")).await.unwrap());
    let stats = reopened.statistics().await.unwrap();

    assert_eq!(stats.total_series, 1);
    assert_eq!(stats.total_links, 1);
    assert_eq!(stats.pending_downloads, 1);
}
