//! Target paths, name sanitization and output discovery for episode downloads.
//!
//! Layout: `<output>/<Series Name>/Season NN/<SeriesName>S<season>F<episode:02>.<ext>`.
//! The downloader writes to a `temp_*` name next to the final file; the
//! produced file is located afterwards and renamed into place.

use std::io;
use std::path::{Path, PathBuf};

/// Extensions accepted as a finished video, in order of preference.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "avi", "mov", "webm"];

/// Prefix of temporary downloader output files.
pub const TEMP_PREFIX: &str = "temp_";

const FALLBACK_NAME: &str = "Unknown Series";

fn is_path_hostile(ch: char) -> bool {
    matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || ch.is_control()
}

/// Directory-safe form of a series name: hostile characters removed,
/// whitespace collapsed to single spaces.
#[must_use]
pub fn sanitize_directory_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !is_path_hostile(*c)).collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches('.').trim();
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// File-safe stem of a series name: like [`sanitize_directory_name`] with
/// spaces and hyphens dropped as well.
#[must_use]
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .filter(|c| !is_path_hostile(*c) && !c.is_whitespace() && *c != '-')
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        FALLBACK_NAME.replace(' ', "")
    } else {
        stem.to_string()
    }
}

/// `Season 01`, `Season 12`, ...
#[must_use]
pub fn season_dir_name(season: u32) -> String {
    format!("Season {season:02}")
}

/// `ShowS1F03`.
#[must_use]
pub fn episode_file_stem(series_name: &str, season: u32, episode: u32) -> String {
    format!("{}S{season}F{episode:02}", sanitize_file_stem(series_name))
}

/// Where one episode's download lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeTarget {
    /// `<output>/<Series Name>/Season NN`.
    pub season_dir: PathBuf,
    /// Final file name without extension.
    pub file_stem: String,
}

impl EpisodeTarget {
    /// Computes the target for an episode under `output_dir`.
    #[must_use]
    pub fn new(output_dir: &Path, series_name: &str, season: u32, episode: u32) -> Self {
        Self {
            season_dir: output_dir
                .join(sanitize_directory_name(series_name))
                .join(season_dir_name(season)),
            file_stem: episode_file_stem(series_name, season, episode),
        }
    }

    /// Final path for a given extension.
    #[must_use]
    pub fn final_path(&self, extension: &str) -> PathBuf {
        self.season_dir
            .join(format!("{}.{}", self.file_stem, extension.trim_start_matches('.')))
    }

    /// An already-downloaded file for this episode, under any video extension.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the filesystem cannot be queried.
    pub async fn existing_final_file(&self) -> io::Result<Option<PathBuf>> {
        for extension in VIDEO_EXTENSIONS {
            let candidate = self.final_path(extension);
            if tokio::fs::try_exists(&candidate).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

/// Fresh temporary stem, unique per call.
#[must_use]
pub fn temp_stem(link_id: i64) -> String {
    format!("{TEMP_PREFIX}{link_id}_{:016x}", rand::random::<u64>())
}

/// Output template handed to the downloader for a temp stem.
#[must_use]
pub fn temp_template(season_dir: &Path, temp_stem: &str) -> PathBuf {
    season_dir.join(format!("{temp_stem}.%(ext)s"))
}

fn is_partial(name: &str) -> bool {
    name.ends_with(".part") || name.ends_with(".ytdl") || name.contains(".part-Frag")
}

/// Finds the file the downloader produced for `temp_stem` in `dir`.
///
/// Partial/fragment files are ignored. Known video extensions are preferred
/// in [`VIDEO_EXTENSIONS`] order; otherwise the first match by name.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be read.
pub async fn find_temp_output(dir: &Path, temp_stem: &str) -> io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut matches: Vec<PathBuf> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(temp_stem) && !is_partial(name) {
            matches.push(path);
        }
    }

    matches.sort();
    for extension in VIDEO_EXTENSIONS {
        if let Some(found) = matches.iter().find(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        }) {
            return Ok(Some(found.clone()));
        }
    }
    Ok(matches.into_iter().next())
}

/// Extension of a produced file, defaulting to `mp4`.
#[must_use]
pub fn output_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or_else(|| "mp4".to_string(), str::to_ascii_lowercase)
}
