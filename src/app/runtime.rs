use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use crate::app::config::{self, Settings};
use crate::app::context::AppContext;
use crate::app::terminal;
use crate::cli::Cli;
use crate::{ProcessExit, commands};

pub(crate) async fn run() -> Result<ProcessExit> {
    // Parse before tracing so --help works without logs
    let cli = Cli::parse();

    let no_color = terminal::is_no_color_requested(&cli);
    terminal::init_tracing(terminal::default_log_level(cli.quiet, cli.verbose), no_color);
    debug!(?cli, "CLI arguments parsed");

    let loaded = config::load_file_config_from(cli.config.as_deref())?;
    if loaded.loaded_from_file {
        info!(path = ?loaded.path, "settings loaded");
    } else {
        debug!(path = ?loaded.path, "no settings file; using defaults");
    }
    let settings = Settings::resolve(loaded.config.as_ref(), cli.db.as_deref());

    let ctx = AppContext::open(settings).await?;
    let interrupted = install_interrupt_flag();

    let outcome = commands::dispatch(&ctx, &cli, interrupted).await;
    ctx.close().await;
    outcome
}

/// Ctrl-C only sets the flag; running work stops cooperatively.
fn install_interrupt_flag() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; finishing current work");
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });
    interrupted
}
