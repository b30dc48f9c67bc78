//! Progress UI (spinner) for download runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use harvester_core::catalog::DownloadStatus;
use harvester_core::download::DownloadStats;
use harvester_core::Catalog;
use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the spinner when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    catalog: Catalog,
    stats: Arc<DownloadStats>,
    total: usize,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(catalog, stats, total, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    catalog: Catalog,
    stats: Arc<DownloadStats>,
    total: usize,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            let active = catalog
                .count_links_by_download_status(DownloadStatus::Downloading)
                .await
                .unwrap_or(0);
            spinner.set_message(progress_message(&stats, total, active));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

fn progress_message(stats: &DownloadStats, total: usize, active: i64) -> String {
    format!(
        "[{}/{}] {} downloading, {} failed, {} skipped",
        stats.finished().min(total),
        total,
        active.max(0),
        stats.failed(),
        stats.skipped()
    )
}
