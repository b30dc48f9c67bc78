//! Settings file loading and resolution against built-in defaults.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use harvester_core::download::{DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_OUTPUT_DIR, DEFAULT_PARALLEL};
use harvester_core::traversal::{
    DEFAULT_DELAY_AFTER_ERROR, DEFAULT_DELAY_BETWEEN_EPISODES, DEFAULT_MAX_CONSECUTIVE_ERRORS,
};

const APP_DIR: &str = "series-harvester";
const CONFIG_FILE: &str = "config.toml";

pub(crate) const DEFAULT_DATABASE_PATH: &str = "series_harvester.db";
pub(crate) const DEFAULT_EXPORT_DIR: &str = "./Exports";
const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 10;

/// Values read from `config.toml`; unset keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileConfig {
    pub(crate) database_path: Option<PathBuf>,
    pub(crate) download_dir: Option<PathBuf>,
    pub(crate) export_dir: Option<PathBuf>,
    pub(crate) ytdlp_path: Option<PathBuf>,
    pub(crate) max_concurrent_downloads: Option<u64>,
    pub(crate) download_timeout_minutes: Option<u64>,
    pub(crate) page_load_timeout_secs: Option<u64>,
    pub(crate) delay_between_episodes_ms: Option<u64>,
    pub(crate) delay_after_error_ms: Option<u64>,
    pub(crate) max_consecutive_errors: Option<u64>,
    /// Browser capabilities only; the HTTP capability ignores it.
    pub(crate) headless: Option<bool>,
    pub(crate) user_agent: Option<String>,
    pub(crate) proxy: Option<String>,
}

impl FileConfig {
    /// Validates values against the ranges the CLI accepts.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(parallel) = self.max_concurrent_downloads
            && !(1..=100).contains(&parallel)
        {
            bail!(
                "Invalid config value for `max_concurrent_downloads`: {parallel}. Expected range: 1..=100"
            );
        }
        validate_range("download_timeout_minutes", self.download_timeout_minutes, 1, 24 * 60)?;
        validate_range("page_load_timeout_secs", self.page_load_timeout_secs, 1, 3600)?;
        validate_range("delay_between_episodes_ms", self.delay_between_episodes_ms, 0, 600_000)?;
        validate_range("delay_after_error_ms", self.delay_after_error_ms, 0, 600_000)?;
        validate_range("max_consecutive_errors", self.max_consecutive_errors, 1, 1000)?;
        if let Some(agent) = &self.user_agent
            && agent.trim().is_empty()
        {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }
        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Where the settings came from.
#[derive(Debug, Clone)]
pub(crate) struct LoadedConfig {
    pub(crate) path: Option<PathBuf>,
    pub(crate) config: Option<FileConfig>,
    pub(crate) loaded_from_file: bool,
}

/// Resolves the settings path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/series-harvester/config.toml`
/// 2. `$HOME/.config/series-harvester/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    default_config_path_for(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn default_config_path_for(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE));
    }
    let home = home?;
    Some(PathBuf::from(home).join(".config").join(APP_DIR).join(CONFIG_FILE))
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the settings file: an explicit path must exist, the default path
/// may be missing.
pub(crate) fn load_file_config_from(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref().filter(|p| p.exists()) else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "database_path" => {
                cfg.database_path = Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "download_dir" => {
                cfg.download_dir = Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "export_dir" => {
                cfg.export_dir = Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "ytdlp_path" => {
                cfg.ytdlp_path = Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "max_concurrent_downloads" => {
                cfg.max_concurrent_downloads = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "download_timeout_minutes" => {
                cfg.download_timeout_minutes = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "page_load_timeout_secs" => {
                cfg.page_load_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "delay_between_episodes_ms" => {
                cfg.delay_between_episodes_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "delay_after_error_ms" => {
                cfg.delay_after_error_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "max_consecutive_errors" => {
                cfg.max_consecutive_errors = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "headless" => {
                cfg.headless = Some(parse_boolean(value).with_context(invalid)?);
            }
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "proxy" => {
                cfg.proxy = Some(parse_string_literal(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

/// Fully resolved settings: `--db` > settings file > built-in default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) database_path: PathBuf,
    pub(crate) download_dir: PathBuf,
    pub(crate) export_dir: PathBuf,
    pub(crate) ytdlp_path: Option<PathBuf>,
    pub(crate) max_concurrent_downloads: usize,
    pub(crate) download_timeout: Duration,
    pub(crate) page_load_timeout: Duration,
    pub(crate) delay_between_episodes: Duration,
    pub(crate) delay_after_error: Duration,
    pub(crate) max_consecutive_errors: usize,
    pub(crate) headless: bool,
    pub(crate) user_agent: Option<String>,
    pub(crate) proxy: Option<String>,
}

impl Settings {
    pub(crate) fn resolve(file: Option<&FileConfig>, db_override: Option<&Path>) -> Self {
        let empty = FileConfig::default();
        let file = file.unwrap_or(&empty);

        let database_path = db_override
            .map(Path::to_path_buf)
            .or_else(|| file.database_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        Self {
            database_path,
            download_dir: file
                .download_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            export_dir: file
                .export_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR)),
            ytdlp_path: file.ytdlp_path.clone(),
            max_concurrent_downloads: file
                .max_concurrent_downloads
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(DEFAULT_PARALLEL),
            download_timeout: file
                .download_timeout_minutes
                .map_or(DEFAULT_DOWNLOAD_TIMEOUT, |m| Duration::from_secs(m * 60)),
            page_load_timeout: Duration::from_secs(
                file.page_load_timeout_secs
                    .unwrap_or(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
            ),
            delay_between_episodes: file
                .delay_between_episodes_ms
                .map_or(DEFAULT_DELAY_BETWEEN_EPISODES, Duration::from_millis),
            delay_after_error: file
                .delay_after_error_ms
                .map_or(DEFAULT_DELAY_AFTER_ERROR, Duration::from_millis),
            max_consecutive_errors: file
                .max_consecutive_errors
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(DEFAULT_MAX_CONSECUTIVE_ERRORS),
            headless: file.headless.unwrap_or(true),
            user_agent: file.user_agent.clone(),
            proxy: file.proxy.clone(),
        }
    }
}
