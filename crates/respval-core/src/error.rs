//! # Error Types
//!
//! Configuration errors shared by every crate that builds a
//! [`ValidatorConfig`](crate::ValidatorConfig). Engine-level errors live next
//! to the engine in `respval-schema`.

use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable or config field holds an unusable value.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Name of the variable or field.
        var: String,
        /// The rejected raw value.
        value: String,
    },

    /// A configuration file could not be read or parsed.
    #[error("failed to load config {path}: {reason}")]
    LoadFailed {
        /// Path of the configuration file.
        path: String,
        /// Human-readable reason for the failure.
        reason: String,
    },
}
