//! Export command handler.

use anyhow::Result;
use harvester_core::export::{self, ExportFormat};

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::cli::ExportArgs;

pub(crate) async fn run_export_command(ctx: &AppContext, args: &ExportArgs) -> Result<ProcessExit> {
    let format: ExportFormat = args.format.parse()?;
    let output = args.output.clone().unwrap_or_else(|| {
        ctx.settings
            .export_dir
            .join(export::default_export_file_name(args.series.as_deref(), format))
    });

    let summary =
        export::export_catalog(&ctx.catalog, format, args.series.as_deref(), &output).await?;

    println!(
        "Exported {} {} to {}",
        summary.rows,
        if format == ExportFormat::Batch { "downloads" } else { "links" },
        summary.path.display()
    );
    Ok(ProcessExit::Success)
}
