//! Runtime settings: built-in defaults, an optional TOML file, then
//! environment overrides. CLI flags are applied last by the binary.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::source::BUILTIN_SOURCES;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sds-finder.toml";

const DEFAULT_POOL_SIZE: usize = 10;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CHUNK_SIZE: usize = 20;

/// Lookup-heavy sources that get a shorter budget unless configured.
const DEFAULT_SOURCE_TIMEOUTS: [(&str, u64); 2] = [("vwr", 10), ("fisher", 10)];

/// Inclusive range accepted for the batch worker pool.
pub const POOL_SIZE_RANGE: std::ops::RangeInclusive<usize> = 1..=100;
const TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=600;
const CHUNK_SIZE_RANGE: std::ops::RangeInclusive<usize> = 1..=1000;

/// Errors produced while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Settings`].
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment variable held a value of the wrong type.
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv {
        /// Variable name.
        var: String,
        /// Rejected value.
        value: String,
    },

    /// A setting is outside its accepted range.
    #[error("invalid value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Setting name.
        field: &'static str,
        /// Rejected value.
        value: u64,
        /// Accepted range, for display.
        expected: String,
    },

    /// `source_order` names a source that is neither built in nor custom.
    #[error("unknown source '{name}' in source_order")]
    UnknownSource {
        /// The unknown name.
        name: String,
    },

    /// A custom source is malformed or shadows another source.
    #[error("invalid custom source '{name}': {reason}")]
    InvalidCustomSource {
        /// Custom source name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// A config-defined source whose document URL is a template over `{cas}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSource {
    /// Source name used in `source_order` and provenance.
    pub name: String,
    /// Document URL containing a `{cas}` placeholder.
    pub url_template: String,
}

/// Effective engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Flat directory holding `{identifier}-SDS.pdf` files.
    pub sds_dir: PathBuf,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Batch worker pool size.
    pub pool_size: usize,
    /// Default per-source timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Sub-batch size used by imports.
    pub chunk_size: usize,
    /// Source names in priority order.
    pub source_order: Vec<String>,
    /// Per-source timeout overrides in seconds.
    pub source_timeouts: BTreeMap<String, u64>,
    /// Template sources available to `source_order`.
    pub custom_sources: Vec<CustomSource>,
    /// Optional GHS to NFPA rule table replacing the built-in one.
    pub nfpa_rules_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sds_dir: PathBuf::from("./sds_files"),
            database_path: PathBuf::from("./sds.db"),
            pool_size: DEFAULT_POOL_SIZE,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            source_order: BUILTIN_SOURCES.iter().map(ToString::to_string).collect(),
            source_timeouts: DEFAULT_SOURCE_TIMEOUTS
                .iter()
                .map(|(name, secs)| ((*name).to_string(), *secs))
                .collect(),
            custom_sources: Vec::new(),
            nfpa_rules_path: None,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from [`DEFAULT_CONFIG_FILE`] when it
    /// exists, then applies process environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or
    /// when the effective settings are invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses a TOML config file over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `SDS_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a numeric variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = lookup("SDS_DIR") {
            self.sds_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("SDS_DATABASE_PATH") {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("SDS_POOL_SIZE") {
            self.pool_size = parse_env("SDS_POOL_SIZE", &value)?;
        }
        if let Some(value) = lookup("SDS_FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = parse_env("SDS_FETCH_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("SDS_CHUNK_SIZE") {
            self.chunk_size = parse_env("SDS_CHUNK_SIZE", &value)?;
        }
        if let Some(value) = lookup("SDS_SOURCE_ORDER") {
            self.source_order = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(value) = lookup("SDS_NFPA_RULES") {
            self.nfpa_rules_path = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Checks ranges and source names.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("pool_size", self.pool_size as u64, &widen(&POOL_SIZE_RANGE))?;
        check_range("fetch_timeout_secs", self.fetch_timeout_secs, &TIMEOUT_RANGE)?;
        check_range("chunk_size", self.chunk_size as u64, &widen(&CHUNK_SIZE_RANGE))?;
        for secs in self.source_timeouts.values() {
            check_range("source_timeouts", *secs, &TIMEOUT_RANGE)?;
        }

        for custom in &self.custom_sources {
            if BUILTIN_SOURCES.contains(&custom.name.as_str()) {
                return Err(ConfigError::InvalidCustomSource {
                    name: custom.name.clone(),
                    reason: "name shadows a built-in source".to_string(),
                });
            }
            if !custom.url_template.contains("{cas}") {
                return Err(ConfigError::InvalidCustomSource {
                    name: custom.name.clone(),
                    reason: "url_template has no {cas} placeholder".to_string(),
                });
            }
        }

        for name in &self.source_order {
            let known = BUILTIN_SOURCES.contains(&name.as_str())
                || self.custom_sources.iter().any(|custom| &custom.name == name);
            if !known {
                return Err(ConfigError::UnknownSource { name: name.clone() });
            }
        }
        Ok(())
    }

    /// Effective timeout for source `name`.
    #[must_use]
    pub fn timeout_for(&self, name: &str) -> Duration {
        Duration::from_secs(
            self.source_timeouts
                .get(name)
                .copied()
                .unwrap_or(self.fetch_timeout_secs),
        )
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn widen(range: &std::ops::RangeInclusive<usize>) -> std::ops::RangeInclusive<u64> {
    (*range.start() as u64)..=(*range.end() as u64)
}

fn check_range(
    field: &'static str,
    value: u64,
    range: &std::ops::RangeInclusive<u64>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange {
        field,
        value,
        expected: format!("{}..={}", range.start(), range.end()),
    })
}
