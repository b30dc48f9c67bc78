//! Download command handler: drain pending links through yt-dlp.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use harvester_core::catalog::PendingLinkFilter;
use harvester_core::download::{DownloadStats, MAX_PARALLEL};
use harvester_core::{DownloadRequest, DownloadResult, DownloadScheduler, YtDlpDownloader};
use tracing::{info, warn};

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::app::{exit_handler, progress, terminal};
use crate::cli::DownloadArgs;

const MAX_LISTED_ERRORS: usize = 10;

pub(crate) async fn run_download_command(
    ctx: &AppContext,
    args: &DownloadArgs,
    quiet: bool,
    interrupted: Arc<AtomicBool>,
) -> Result<ProcessExit> {
    let request = DownloadRequest {
        filter: PendingLinkFilter {
            series: args.series.clone(),
            season: args.season,
            episode: args.episode,
        },
        output_dir: args
            .output_dir
            .clone()
            .unwrap_or_else(|| ctx.settings.download_dir.clone()),
        quality: args.quality.clone(),
        overwrite_existing: args.overwrite,
    };

    let parallel = args
        .parallel
        .map_or(ctx.settings.max_concurrent_downloads, usize::from)
        .min(MAX_PARALLEL);

    let working_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let program = YtDlpDownloader::locate(ctx.settings.ytdlp_path.as_deref(), &working_dir);
    info!(program = %program.display(), parallel, "using yt-dlp");
    let downloader =
        YtDlpDownloader::new(program).with_timeout(ctx.settings.download_timeout);
    let scheduler = DownloadScheduler::new(Arc::new(downloader), parallel)?;

    let total = ctx
        .catalog
        .get_pending_download_links(&request.filter)
        .await?
        .len();
    if total == 0 {
        println!("No pending downloads.");
        return Ok(ProcessExit::Success);
    }

    let stats = Arc::new(DownloadStats::new());
    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) =
        progress::spawn_progress_ui(use_spinner, ctx.catalog.clone(), Arc::clone(&stats), total);

    let outcome = scheduler
        .start_downloads_interruptible(&ctx.catalog, &request, interrupted, stats)
        .await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle
        && let Err(e) = handle.await
    {
        warn!(error = %e, "progress task ended abnormally");
    }

    let result = outcome?;
    print_summary(&result);
    Ok(exit_handler::download_exit(&result))
}

fn print_summary(result: &DownloadResult) {
    println!(
        "Downloads: {} succeeded, {} failed, {} skipped of {}",
        result.succeeded, result.failed, result.skipped, result.total
    );
    for (quality, count) in &result.quality_breakdown {
        println!("  {quality}: {count}");
    }
    if result.interrupted {
        println!(
            "Interrupted: {} downloads were not started",
            result.not_started()
        );
    }
    for failure in result.errors.iter().take(MAX_LISTED_ERRORS) {
        println!("  ! {failure}");
    }
    if result.errors.len() > MAX_LISTED_ERRORS {
        println!("  ... and {} more", result.errors.len() - MAX_LISTED_ERRORS);
    }
    println!("Duration: {:.1}s", result.duration.as_secs_f64());
}
