//! Validate command handler.

use std::time::Duration;

use anyhow::Result;
use harvester_core::validation::{self, ValidationOptions};

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::cli::ValidateArgs;

pub(crate) async fn run_validate_command(
    ctx: &AppContext,
    args: &ValidateArgs,
) -> Result<ProcessExit> {
    let options = ValidationOptions {
        series: args.series.clone(),
        force: args.force,
        batch_size: usize::try_from(args.batch_size)?,
        timeout: Duration::from_secs(args.timeout),
    };

    let summary = validation::validate_links(&ctx.catalog, &ctx.registry, &options).await?;

    println!(
        "Validated {} links: {} valid, {} invalid",
        summary.checked, summary.valid, summary.invalid
    );
    if summary.failed > 0 {
        println!("  {} checks failed; those links stay untested", summary.failed);
    }
    if summary.unsupported > 0 {
        println!("  {} links have no matching capability", summary.unsupported);
    }
    Ok(ProcessExit::Success)
}
