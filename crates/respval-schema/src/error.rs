//! # Setup Errors
//!
//! Failures that prevent a validation from running at all. These never reach
//! the caller of [`ResponseValidator::validate_schema`]: the orchestrator turns
//! each one into a failed result with a single detail at [`error_path`].
//!
//! Constraint violations are not errors; they are
//! [`ValidationErrorDetail`](respval_core::ValidationErrorDetail) values.
//!
//! [`ResponseValidator::validate_schema`]: crate::ResponseValidator::validate_schema
//! [`error_path`]: ValidateError::error_path

use respval_core::{INPUT_PATH, SCHEMA_PATH};
use thiserror::Error;

use crate::loader::SchemaFileError;

/// Errors that abort a validation call before constraints are evaluated.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// The data under test is larger than the configured cap.
    #[error("input exceeds maximum size of {limit} bytes (got {actual} bytes)")]
    InputTooLarge {
        /// Configured cap in bytes.
        limit: usize,
        /// Serialized size of the data in bytes.
        actual: usize,
    },

    /// The schema file could not be loaded.
    #[error("failed to load schema file: {0}")]
    SchemaFile(#[from] SchemaFileError),

    /// A schema (or one of its property sub-schemas) failed to compile.
    #[error("invalid schema: {reason}")]
    SchemaCompile {
        /// Compiler diagnostic.
        reason: String,
    },

    /// A structural schema's `parse` panicked instead of reporting issues.
    #[error("structural schema failed: {0}")]
    StructuralPanic(String),
}

impl ValidateError {
    /// Path under which this failure is reported.
    pub fn error_path(&self) -> &'static str {
        match self {
            Self::InputTooLarge { .. } => INPUT_PATH,
            Self::SchemaFile(_) | Self::SchemaCompile { .. } | Self::StructuralPanic(_) => {
                SCHEMA_PATH
            }
        }
    }
}

/// Render a panic payload as a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
