//! Extract command handler: walk a series and store its links.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use harvester_core::{TraversalEngine, TraversalError, TraversalOptions, TraversalResult};

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::app::exit_handler;
use crate::cli::ExtractArgs;

/// Error messages shown in the summary; the rest is only counted.
const MAX_LISTED_ERRORS: usize = 5;

pub(crate) async fn run_extract_command(
    ctx: &AppContext,
    args: &ExtractArgs,
    interrupted: &AtomicBool,
) -> Result<ProcessExit> {
    let options = traversal_options(ctx, args);
    let engine = TraversalEngine::new(Arc::clone(&ctx.registry));

    match engine
        .run_interruptible(&ctx.catalog, &args.url, &options, interrupted)
        .await
    {
        Ok(result) => {
            print_summary(&result);
            Ok(exit_handler::traversal_exit(&result))
        }
        Err(error) => {
            if let TraversalError::Aborted { partial, .. } = &error {
                print_summary(partial);
            }
            Err(error.into())
        }
    }
}

fn traversal_options(ctx: &AppContext, args: &ExtractArgs) -> TraversalOptions {
    let settings = &ctx.settings;
    TraversalOptions {
        series_name: args.series_name.clone(),
        preferred_capability: args.host.clone(),
        start_season: args.start_season,
        start_episode: args.start_episode,
        max_episodes: args.max_episodes.and_then(|n| usize::try_from(n).ok()),
        max_consecutive_errors: args
            .max_errors
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(settings.max_consecutive_errors),
        delay_between_episodes: settings.delay_between_episodes,
        delay_after_error: settings.delay_after_error,
        continue_on_error: !args.stop_on_error,
        skip_existing: args.skip_existing,
        force_rescrape: args.force_rescrape,
    }
}

fn print_summary(result: &TraversalResult) {
    println!("Series: {} (id {})", result.series_name, result.series_id);
    println!(
        "Episodes processed: {}, skipped: {}",
        result.processed_episodes, result.skipped_episodes
    );
    println!("New links: {}", result.total_links_found);
    println!(
        "Errors: {} (success rate {:.1}%)",
        result.total_errors,
        result.success_rate()
    );
    for (host, count) in &result.host_statistics {
        println!("  {host}: {count}");
    }
    if let Some(reason) = result.stop_reason {
        println!("Stopped: {reason}");
    }
    for message in result.error_messages.iter().take(MAX_LISTED_ERRORS) {
        println!("  ! {message}");
    }
    if result.error_messages.len() > MAX_LISTED_ERRORS {
        println!(
            "  ... and {} more",
            result.error_messages.len() - MAX_LISTED_ERRORS
        );
    }
    println!("Duration: {:.1}s", result.duration.as_secs_f64());
}
