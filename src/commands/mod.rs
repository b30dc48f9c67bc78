//! CLI command handlers.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::cli::{Cli, Command};

mod cleanup;
mod download;
mod export;
mod extract;
mod status;
mod validate;

pub(crate) use cleanup::run_cleanup_command;
pub(crate) use download::run_download_command;
pub(crate) use export::run_export_command;
pub(crate) use extract::run_extract_command;
pub(crate) use status::run_status_command;
pub(crate) use validate::run_validate_command;

/// Runs the selected subcommand against the shared context.
pub(crate) async fn dispatch(
    ctx: &AppContext,
    cli: &Cli,
    interrupted: Arc<AtomicBool>,
) -> Result<ProcessExit> {
    match &cli.command {
        Command::Extract(args) => run_extract_command(ctx, args, &interrupted).await,
        Command::Download(args) => run_download_command(ctx, args, cli.quiet, interrupted).await,
        Command::Status(args) => run_status_command(ctx, args).await,
        Command::Export(args) => run_export_command(ctx, args).await,
        Command::Validate(args) => run_validate_command(ctx, args).await,
        Command::Cleanup(args) => run_cleanup_command(ctx, args).await,
    }
}
