use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FILENAME: &str = "stopdigest.toml";

/// Overrides `log_dir` from the config file when set and non-empty.
pub const LOG_DIR_ENV: &str = "CLAUDE_HOOKS_LOG_DIR";

/// Hook configuration, optionally stored as `stopdigest.toml` in the
/// directory the hook runs from.
///
/// ```toml
/// log_dir = "logs"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Root under which each session gets its own log directory.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load `stopdigest.toml` from `dir`, then apply the environment override.
    ///
    /// A missing file means defaults. Unlike the log directories, the file
    /// is never created.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(FILENAME);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let config = Self::from_sources(contents.as_deref(), env::var(LOG_DIR_ENV).ok())
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(log_dir = %config.log_dir.display(), "configuration loaded");
        Ok(config)
    }

    /// Defaults plus the environment override, ignoring any config file.
    pub fn from_env() -> Self {
        Self::with_override(Config::default(), env::var(LOG_DIR_ENV).ok())
    }

    fn from_sources(file: Option<&str>, log_dir_override: Option<String>) -> Result<Self> {
        let config: Config = match file {
            Some(contents) => toml::from_str(contents)?,
            None => Config::default(),
        };
        Ok(Self::with_override(config, log_dir_override))
    }

    fn with_override(mut config: Config, log_dir_override: Option<String>) -> Self {
        if let Some(dir) = log_dir_override.filter(|d| !d.trim().is_empty()) {
            config.log_dir = PathBuf::from(dir.trim());
        }
        config
    }
}
