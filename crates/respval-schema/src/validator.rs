//! # Validation Orchestrator
//!
//! [`ResponseValidator::validate_schema`] is the single entry point. It
//! never fails and never panics on caller data: setup problems (oversized
//! input, unreadable file, uncompilable schema, panicking structural parser)
//! come back as a failed [`ValidationResult`] with one detail at `input` or
//! `schema`.
//!
//! Steps: input size guard, format detection, processor dispatch, shape
//! assertion (appended), result assembly.

use std::io;
use std::time::Instant;

use respval_core::ValidatorConfig;
use serde_json::Value;

use crate::detect::{detect_format, SupportedSchema};
use crate::engine::ConstraintEngine;
use crate::error::ValidateError;
use crate::openapi::DEFAULT_STATUS;
use crate::processors::{process, OpenApiTarget, ProcessedSchema};
use crate::report::{build_error_result, build_result, ValidationResult};
use crate::shape::{validate_shape, ShapeAssertion};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Shape assertion run after the schema check.
    pub shape: Option<ShapeAssertion>,
    /// OpenAPI path. Takes precedence over `endpoint`.
    pub path: Option<String>,
    /// Alias for `path`.
    pub endpoint: Option<String>,
    /// OpenAPI method.
    pub method: Option<String>,
    /// OpenAPI response status; 200 when unset.
    pub status: Option<u16>,
}

impl ValidateOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `shape` after the schema check.
    #[must_use]
    pub fn with_shape(mut self, shape: ShapeAssertion) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Set the OpenAPI path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the OpenAPI endpoint, used when no path is set.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the OpenAPI method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the OpenAPI response status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The OpenAPI response these options point at.
    pub fn target(&self) -> OpenApiTarget<'_> {
        OpenApiTarget {
            endpoint: self.path.as_deref().or(self.endpoint.as_deref()),
            method: self.method.as_deref(),
            status: self.status.unwrap_or(DEFAULT_STATUS),
        }
    }
}

/// Validates response bodies against any [`SupportedSchema`].
///
/// Holds the compiled-validator cache, so one instance should be shared
/// across calls. It is `Send + Sync`.
#[derive(Debug)]
pub struct ResponseValidator {
    config: ValidatorConfig,
    engine: ConstraintEngine,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ResponseValidator {
    /// Create a validator from `config`.
    pub fn new(config: ValidatorConfig) -> Self {
        let engine = ConstraintEngine::new(config.cache_capacity);
        Self { config, engine }
    }

    /// Create a validator with [`ValidatorConfig::default`].
    pub fn with_defaults() -> Self {
        Self::new(ValidatorConfig::default())
    }

    /// The configuration this validator was built with.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// The engine, and through it the compiled-validator cache.
    pub fn engine(&self) -> &ConstraintEngine {
        &self.engine
    }

    /// Validate `data` against `schema`.
    pub fn validate_schema(
        &self,
        data: &Value,
        schema: &SupportedSchema,
        options: &ValidateOptions,
    ) -> ValidationResult {
        let started = Instant::now();
        let format = detect_format(schema);

        match self.run(data, schema, options) {
            Ok(processed) => {
                let mut errors = processed.validation_errors;
                if let Some(shape) = &options.shape {
                    errors.extend(validate_shape(data, shape, ""));
                }
                let elapsed = started.elapsed();
                tracing::debug!(
                    format = %format,
                    errors = errors.len(),
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "validation finished"
                );
                build_result(
                    errors,
                    format,
                    elapsed,
                    processed.processed_schema,
                    self.config.max_error_details,
                )
            }
            Err(err) => {
                tracing::warn!(format = %format, error = %err, "validation setup failed");
                build_error_result(
                    &err,
                    format,
                    started.elapsed(),
                    self.config.max_error_details,
                )
            }
        }
    }

    fn run(
        &self,
        data: &Value,
        schema: &SupportedSchema,
        options: &ValidateOptions,
    ) -> Result<ProcessedSchema, ValidateError> {
        check_input_size(data, self.config.max_input_bytes)?;
        process(
            &self.engine,
            data,
            schema,
            options.target(),
            self.config.schema_root.as_deref(),
        )
    }
}

/// Reject `data` whose compact JSON form exceeds `limit` bytes.
///
/// # Errors
///
/// [`ValidateError::InputTooLarge`] over the limit.
pub fn check_input_size(data: &Value, limit: usize) -> Result<(), ValidateError> {
    let actual = serialized_len(data);
    if actual > limit {
        return Err(ValidateError::InputTooLarge { limit, actual });
    }
    Ok(())
}

/// Length in bytes of the compact JSON form of `data`, without building it.
fn serialized_len(data: &Value) -> usize {
    let mut counter = ByteCounter::default();
    // A `Value` always serializes and the counter never fails to write.
    let _ = serde_json::to_writer(&mut counter, data);
    counter.bytes
}

#[derive(Default)]
struct ByteCounter {
    bytes: usize,
}

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
