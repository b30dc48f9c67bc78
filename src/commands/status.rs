//! Status command handler: catalog statistics and per-series progress.

use anyhow::Result;
use harvester_core::catalog::{EpisodeOverview, SeriesStatus, SeriesSummary};

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::cli::StatusArgs;

pub(crate) async fn run_status_command(ctx: &AppContext, args: &StatusArgs) -> Result<ProcessExit> {
    let stats = ctx.catalog.statistics().await?;
    println!(
        "Catalog: {} series, {} seasons, {} episodes",
        stats.total_series, stats.total_seasons, stats.total_episodes
    );
    println!(
        "Links: {} total, {} valid ({:.1}%)",
        stats.total_links,
        stats.valid_links,
        stats.valid_links_percentage()
    );
    println!(
        "Downloads: {} completed, {} pending, {} failed ({:.1}% complete)",
        stats.completed_downloads,
        stats.pending_downloads,
        stats.failed_downloads,
        stats.completion_rate()
    );

    let status_filter = args.active_only.then_some(SeriesStatus::Processing);
    let summaries = ctx
        .catalog
        .list_series(args.series.as_deref(), status_filter)
        .await?;

    if summaries.is_empty() {
        if args.series.is_some() || args.active_only {
            println!("No series matched the current filters.");
        }
        return Ok(ProcessExit::Success);
    }

    println!();
    for summary in &summaries {
        println!("{}", render_series_row(summary));
        if args.detailed {
            for episode in ctx.catalog.episode_overview(summary.series.id).await? {
                println!("{}", render_episode_row(&episode));
            }
        }
    }

    Ok(ProcessExit::Success)
}

fn render_series_row(summary: &SeriesSummary) -> String {
    let mut row = format!(
        "{} [{}] seasons {}, episodes {}, links {}, downloaded {}",
        summary.series.name,
        summary.series.status.as_str(),
        summary.total_seasons,
        summary.total_episodes,
        summary.found_links,
        summary.completed_downloads
    );
    if let Some(error) = &summary.series.error_message {
        row.push_str(&format!(" ({error})"));
    }
    row
}

fn render_episode_row(episode: &EpisodeOverview) -> String {
    let mut row = format!(
        "  S{:02}E{:02} {:<14} links {:>3}, downloaded {:>3}",
        episode.season_number,
        episode.episode_number,
        episode.status.as_str(),
        episode.link_count,
        episode.completed_downloads
    );
    if let Some(error) = &episode.error_message {
        row.push_str(&format!("  {error}"));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_core::catalog::EpisodeStatus;

    #[test]
    fn test_render_episode_row_includes_error() {
        let row = render_episode_row(&EpisodeOverview {
            season_number: 1,
            episode_number: 3,
            status: EpisodeStatus::Failed,
            link_count: 0,
            completed_downloads: 0,
            error_message: Some("S1E3: page load timed out".to_string()),
        });
        assert!(row.starts_with("  S01E03 failed"));
        assert!(row.ends_with("S1E3: page load timed out"));
    }
}
