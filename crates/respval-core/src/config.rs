//! Validator configuration.
//!
//! Defaults are suitable for test suites validating HTTP response bodies.
//! Override via environment variables, a YAML/JSON file, or explicit
//! construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default cap on the serialized size of validated data (1 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

/// Default number of compiled validators kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Upper bound on `"{path}: {message}"` lines in a report.
pub const MAX_ERROR_DETAILS_LIMIT: usize = 50;

/// Default number of `"{path}: {message}"` lines in a report.
pub const DEFAULT_MAX_ERROR_DETAILS: usize = MAX_ERROR_DETAILS_LIMIT;

/// Configuration for a response validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Data whose JSON form is larger than this is rejected before processing.
    pub max_input_bytes: usize,
    /// Maximum number of compiled validators cached. Oldest entries are evicted first.
    pub cache_capacity: usize,
    /// Maximum number of error lines carried in report UI data, at most
    /// [`MAX_ERROR_DETAILS_LIMIT`].
    pub max_error_details: usize,
    /// Base directory for relative schema file paths. `None` means the
    /// process working directory.
    pub schema_root: Option<PathBuf>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_error_details: DEFAULT_MAX_ERROR_DETAILS,
            schema_root: None,
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `RESPVAL_MAX_INPUT_BYTES` (default: 1048576)
    /// - `RESPVAL_CACHE_CAPACITY` (default: 100, must be non-zero)
    /// - `RESPVAL_MAX_ERROR_DETAILS` (default: 50, at most 50)
    /// - `RESPVAL_SCHEMA_ROOT` (default: unset)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but cannot
    /// be parsed, or parses to an out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from a YAML or JSON file.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LoadFailed`] if the file cannot be read or
    /// parsed, and [`ConfigError::InvalidValue`] if it parses to an unusable
    /// configuration.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |reason: String| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_failed(e.to_string()))?;
        // JSON documents are valid YAML, so one parser covers both.
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
        config.validated()
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_input_bytes: env_usize(&lookup, "RESPVAL_MAX_INPUT_BYTES", defaults.max_input_bytes)?,
            cache_capacity: env_usize(&lookup, "RESPVAL_CACHE_CAPACITY", defaults.cache_capacity)?,
            max_error_details: env_usize(
                &lookup,
                "RESPVAL_MAX_ERROR_DETAILS",
                defaults.max_error_details,
            )?,
            schema_root: lookup("RESPVAL_SCHEMA_ROOT")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        };
        config.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                var: "cache_capacity".to_string(),
                value: "0".to_string(),
            });
        }
        if self.max_error_details > MAX_ERROR_DETAILS_LIMIT {
            return Err(ConfigError::InvalidValue {
                var: "max_error_details".to_string(),
                value: self.max_error_details.to_string(),
            });
        }
        Ok(self)
    }
}

fn env_usize(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw,
        }),
    }
}
