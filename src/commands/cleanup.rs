//! Cleanup command handler.

use std::time::Duration;

use anyhow::Result;

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::cli::CleanupArgs;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

pub(crate) async fn run_cleanup_command(ctx: &AppContext, args: &CleanupArgs) -> Result<ProcessExit> {
    let older_than = Duration::from_secs(u64::from(args.days) * SECS_PER_DAY);
    let catalog = &ctx.catalog;
    let verb = if args.dry_run { "Would remove" } else { "Removed" };

    if !args.no_invalid {
        let count = if args.dry_run {
            u64::try_from(catalog.count_invalid_links(older_than).await?)?
        } else {
            catalog.cleanup_invalid_links(older_than).await?
        };
        println!("{verb} {count} invalid links older than {} days", args.days);
    }

    if !args.no_failed {
        let count = if args.dry_run {
            u64::try_from(catalog.count_failed_series(older_than).await?)?
        } else {
            catalog.cleanup_failed_series(older_than).await?
        };
        println!("{verb} {count} failed series older than {} days", args.days);
    }

    if args.empty_series {
        let count = if args.dry_run {
            u64::try_from(catalog.count_empty_series().await?)?
        } else {
            catalog.cleanup_empty_series().await?
        };
        println!("{verb} {count} empty series");
    }

    Ok(ProcessExit::Success)
}
