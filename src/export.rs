//! Catalog export as JSON, CSV or a yt-dlp batch script.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{info, instrument};

use crate::catalog::{Catalog, CatalogError, DownloadStatus, ExportRow};
use crate::download::{DEFAULT_QUALITY, EpisodeTarget};

/// Output formats understood by [`export_catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    /// POSIX shell script with one yt-dlp call per pending link.
    Batch,
}

impl ExportFormat {
    /// File extension for the format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Batch => "sh",
        }
    }

    /// Lowercase name as accepted on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Batch => "batch",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "batch" => Ok(Self::Batch),
            _ => Err(ExportError::UnknownFormat {
                value: value.to_string(),
            }),
        }
    }
}

/// Errors raised while exporting.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unknown export format '{value}'\n  Suggestion: Use one of json, csv, batch")]
    UnknownFormat { value: String },

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write export to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What an export wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Rows (or script lines) written.
    pub rows: usize,
}

/// `<series>_<unix-seconds>.<ext>`, or `series_links_...` without a series.
#[must_use]
pub fn default_export_file_name(series: Option<&str>, format: ExportFormat) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let prefix = series.map_or_else(
        || "series_links".to_string(),
        crate::download::filename::sanitize_file_stem,
    );
    format!("{prefix}_{timestamp}.{}", format.extension())
}

/// Writes the catalog's links (optionally one series) to `output`.
///
/// # Errors
///
/// Returns [`ExportError`] when the catalog cannot be read or the file
/// cannot be written.
#[instrument(skip(catalog), fields(output = %output.display()))]
pub async fn export_catalog(
    catalog: &Catalog,
    format: ExportFormat,
    series: Option<&str>,
    output: &Path,
) -> Result<ExportSummary, ExportError> {
    let rows = catalog.export_rows(series).await?;

    let (content, written) = match format {
        ExportFormat::Json => (render_json(&rows)?, rows.len()),
        ExportFormat::Csv => (render_csv(&rows), rows.len()),
        ExportFormat::Batch => render_batch(&rows),
    };

    let io_error = |source| ExportError::Io {
        path: output.to_path_buf(),
        source,
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(output, content).await.map_err(io_error)?;

    info!(rows = written, format = %format, "export written");
    Ok(ExportSummary {
        path: output.to_path_buf(),
        rows: written,
    })
}

/// Pretty-printed JSON array of rows.
///
/// # Errors
///
/// Returns [`ExportError::Serialize`] if serialization fails.
pub fn render_json(rows: &[ExportRow]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(rows)?)
}

const CSV_HEADER: &str = "series,season,episode,episode_status,url,host,link_type,quality,is_valid,download_status,download_path,found_at";

/// CSV with a header row; fields quoted when they contain `,`, `"` or newlines.
#[must_use]
pub fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for row in rows {
        let fields = [
            row.series_name.clone(),
            row.season_number.to_string(),
            row.episode_number.to_string(),
            row.episode_status.as_str().to_string(),
            row.url.clone(),
            row.host_name.clone(),
            row.link_type.as_str().to_string(),
            row.quality.as_str().to_string(),
            row.is_valid.to_string(),
            row.download_status.as_str().to_string(),
            row.download_path.clone().unwrap_or_default(),
            row.found_at.clone(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Shell script downloading every valid, not-yet-downloaded link into the
/// same layout the scheduler uses, relative to the working directory.
///
/// Returns the script and the number of download lines.
#[must_use]
pub fn render_batch(rows: &[ExportRow]) -> (String, usize) {
    let mut out = String::from("#!/bin/sh\n# Generated by series-harvester\nset -u\n\n");
    let mut count = 0;
    let mut last_dir: Option<PathBuf> = None;

    for row in rows
        .iter()
        .filter(|r| r.is_valid && r.download_status == DownloadStatus::NotStarted)
    {
        let target = EpisodeTarget::new(
            Path::new("."),
            &row.series_name,
            row.season_number,
            row.episode_number,
        );
        if last_dir.as_ref() != Some(&target.season_dir) {
            out.push_str(&format!(
                "mkdir -p {}\n",
                shell_quote(&target.season_dir.display().to_string())
            ));
            last_dir = Some(target.season_dir.clone());
        }
        let template = target.final_path("%(ext)s");
        out.push_str(&format!(
            "yt-dlp {} --output {} --format {DEFAULT_QUALITY} --merge-output-format mp4 --no-playlist\n",
            shell_quote(&row.url),
            shell_quote(&template.display().to_string()),
        ));
        count += 1;
    }

    (out, count)
}
