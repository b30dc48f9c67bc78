//! External downloader process contract and the yt-dlp implementation.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Default per-download ceiling.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default format selector passed to yt-dlp.
pub const DEFAULT_QUALITY: &str = "best";

const YTDLP_PROGRAM: &str = "yt-dlp";

/// Longest stderr excerpt kept in an error.
const STDERR_EXCERPT_CHARS: usize = 500;

/// Ways an external download can fail before producing output.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// The process could not be started.
    #[error(
        "failed to start {program}: {source}\n  Suggestion: Install yt-dlp or set ytdlp_path in the config file"
    )]
    Spawn {
        /// Program that was executed.
        program: String,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("downloader exited with {}: {stderr}", exit_label(*.code))]
    NonZeroExit {
        /// Exit code, absent when killed by a signal.
        code: Option<i32>,
        /// First lines of stderr.
        stderr: String,
    },

    /// The process exceeded the per-download ceiling and was killed.
    #[error("downloader timed out after {}s", .after.as_secs())]
    Timeout {
        /// Ceiling that was hit.
        after: Duration,
    },

    /// Waiting on the process failed.
    #[error("failed waiting for downloader: {0}")]
    Wait(#[source] io::Error),
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}

/// A program that fetches one URL into a file named after `output_template`.
///
/// Success means the process reported success; the scheduler separately
/// checks that a matching file exists.
#[async_trait]
pub trait ExternalDownloader: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Downloads `url`, writing to `output_template` (`%(ext)s` placeholder allowed).
    ///
    /// # Errors
    ///
    /// Returns a [`DownloaderError`] describing why the process failed.
    async fn download(
        &self,
        url: &str,
        output_template: &Path,
        quality: &str,
    ) -> Result<(), DownloaderError>;
}

/// Runs `yt-dlp` as a subprocess.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    program: PathBuf,
    timeout: Duration,
}

impl YtDlpDownloader {
    /// Uses `program` with the default timeout.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Overrides the per-download ceiling.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executable in use.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Resolves the executable: the configured path, else `yt-dlp` in the
    /// working directory or its `bin/`, else `yt-dlp` from `PATH`.
    #[must_use]
    pub fn locate(configured: Option<&Path>, working_dir: &Path) -> PathBuf {
        if let Some(path) = configured {
            return path.to_path_buf();
        }

        let binary = if cfg!(windows) {
            format!("{YTDLP_PROGRAM}.exe")
        } else {
            YTDLP_PROGRAM.to_string()
        };
        [working_dir.join(&binary), working_dir.join("bin").join(&binary)]
            .into_iter()
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| PathBuf::from(binary))
    }

    /// Command-line arguments for one download.
    #[must_use]
    pub fn build_args(url: &str, output_template: &Path, quality: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            url.into(),
            "--output".into(),
            output_template.as_os_str().to_os_string(),
            "--format".into(),
        ];
        args.push(if quality.trim().is_empty() {
            DEFAULT_QUALITY.into()
        } else {
            quality.into()
        });
        args.extend(
            ["--merge-output-format", "mp4", "--no-playlist", "--no-warnings", "--quiet"]
                .map(OsString::from),
        );
        args
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new(YTDLP_PROGRAM)
    }
}

fn stderr_excerpt(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let excerpt: String = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    excerpt.chars().take(STDERR_EXCERPT_CHARS).collect()
}

#[async_trait]
impl ExternalDownloader for YtDlpDownloader {
    fn name(&self) -> &str {
        YTDLP_PROGRAM
    }

    #[instrument(skip(self, output_template), fields(program = %self.program.display()))]
    async fn download(
        &self,
        url: &str,
        output_template: &Path,
        quality: &str,
    ) -> Result<(), DownloaderError> {
        let args = Self::build_args(url, output_template, quality);
        debug!(?args, "starting downloader");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DownloaderError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stderr = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            let mut buffer = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buffer).await;
            }
            buffer
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(waited) => waited.map_err(DownloaderError::Wait)?,
            Err(_) => {
                warn!(url, timeout_secs = self.timeout.as_secs(), "downloader timed out; killing");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out downloader");
                }
                stderr_reader.abort();
                return Err(DownloaderError::Timeout {
                    after: self.timeout,
                });
            }
        };

        let stderr = stderr_reader.await.unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(DownloaderError::NonZeroExit {
                code: status.code(),
                stderr: stderr_excerpt(&stderr),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_matches_contract() {
        let args = YtDlpDownloader::build_args(
            "https://vidmoly.to/embed-abc.html",
            Path::new("/out/Show/Season 01/temp_1_ab.%(ext)s"),
            "best",
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "https://vidmoly.to/embed-abc.html",
                "--output",
                "/out/Show/Season 01/temp_1_ab.%(ext)s",
                "--format",
                "best",
                "--merge-output-format",
                "mp4",
                "--no-playlist",
                "--no-warnings",
                "--quiet",
            ]
        );
    }

    #[test]
    fn test_build_args_blank_quality_uses_default() {
        let args = YtDlpDownloader::build_args("u", Path::new("t"), "  ");
        assert_eq!(args[4], OsString::from(DEFAULT_QUALITY));
    }

    #[test]
    fn test_locate_prefers_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let configured = PathBuf::from("/opt/yt-dlp");
        assert_eq!(
            YtDlpDownloader::locate(Some(&configured), dir.path()),
            configured
        );
    }

    #[test]
    fn test_locate_finds_binary_in_bin_dir() {
        let dir = tempfile::tempdir().unwrap();
        let name = if cfg!(windows) { "yt-dlp.exe" } else { "yt-dlp" };
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin").join(name), b"").unwrap();
        assert_eq!(
            YtDlpDownloader::locate(None, dir.path()),
            dir.path().join("bin").join(name)
        );
    }

    #[test]
    fn test_locate_falls_back_to_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let located = YtDlpDownloader::locate(None, dir.path());
        assert!(located.starts_with("yt-dlp"));
    }

    #[test]
    fn test_stderr_excerpt_joins_non_empty_lines() {
        let excerpt = stderr_excerpt(b"ERROR: Unsupported URL\n\n  extra detail  \n");
        assert_eq!(excerpt, "ERROR: Unsupported URL | extra detail");
    }

    #[test]
    fn test_non_zero_exit_display() {
        let err = DownloaderError::NonZeroExit {
            code: Some(1),
            stderr: "ERROR: boom".to_string(),
        };
        assert_eq!(err.to_string(), "downloader exited with code 1: ERROR: boom");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let downloader = YtDlpDownloader::new("/definitely/not/here/yt-dlp");
        let err = downloader
            .download("https://h/x", Path::new("/tmp/temp_x.%(ext)s"), "best")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloaderError::Spawn { .. }));
    }
}
