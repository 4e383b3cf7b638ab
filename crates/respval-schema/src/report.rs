//! Validation results and the UI summary attached to them.

use std::fmt;
use std::time::Duration;

use respval_core::config::MAX_ERROR_DETAILS_LIMIT;
use respval_core::{truncate_display, SchemaFormat, ValidationErrorDetail, MAX_DISPLAY_LEN};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidateError;

/// Status glyph for a passing result.
pub const PASS_ICON: &str = "✅";

/// Status glyph for a failing result.
pub const FAIL_ICON: &str = "❌";

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True exactly when `errors` is empty.
    pub success: bool,
    /// Every failure, in the order found.
    pub errors: Vec<ValidationErrorDetail>,
    /// The format the schema was routed under.
    pub schema_format: SchemaFormat,
    /// Elapsed wall-clock time in milliseconds.
    pub validation_time: f64,
    /// The schema actually evaluated; absent when setup failed first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Display data for report renderers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_data: Option<UiData>,
}

/// Pre-rendered strings for report renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiData {
    /// [`PASS_ICON`] or [`FAIL_ICON`].
    pub status_icon: String,
    /// One-line outcome.
    pub validation_summary: String,
    /// Format label and elapsed time.
    pub schema_info: String,
    /// `"{path}: {message}"` lines, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Vec<String>>,
}

impl ValidationResult {
    /// Elapsed time as a `Duration`.
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.validation_time.max(0.0) / 1000.0)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ui_data {
            Some(ui) => {
                write!(f, "{} {} [{}]", ui.status_icon, ui.validation_summary, ui.schema_info)?;
                for line in ui.error_details.iter().flatten() {
                    write!(f, "\n  {line}")?;
                }
                let hidden = self
                    .errors
                    .len()
                    .saturating_sub(ui.error_details.as_ref().map_or(0, Vec::len));
                if hidden > 0 {
                    write!(f, "\n  … and {hidden} more")?;
                }
                Ok(())
            }
            None => {
                let summary = summary(&self.errors);
                write!(f, "{summary} [{}]", self.schema_format)
            }
        }
    }
}

/// Assemble the result of a validation that ran to completion.
pub fn build_result(
    errors: Vec<ValidationErrorDetail>,
    schema_format: SchemaFormat,
    elapsed: Duration,
    schema: Option<Value>,
    max_error_details: usize,
) -> ValidationResult {
    let validation_time = elapsed.as_secs_f64() * 1000.0;
    let success = errors.is_empty();
    let ui_data = UiData {
        status_icon: if success { PASS_ICON } else { FAIL_ICON }.to_string(),
        validation_summary: summary(&errors),
        schema_info: format!("{schema_format} ({validation_time:.2}ms)"),
        error_details: (!success).then(|| {
            errors
                .iter()
                .take(max_error_details.min(MAX_ERROR_DETAILS_LIMIT))
                .map(|detail| truncate_display(&detail.to_string(), MAX_DISPLAY_LEN))
                .collect()
        }),
    };
    ValidationResult {
        success,
        errors,
        schema_format,
        validation_time,
        schema,
        ui_data: Some(ui_data),
    }
}

/// Assemble the single-error result for a setup failure.
pub fn build_error_result(
    error: &ValidateError,
    schema_format: SchemaFormat,
    elapsed: Duration,
    max_error_details: usize,
) -> ValidationResult {
    let detail = ValidationErrorDetail::new(error.error_path(), error.to_string());
    build_result(vec![detail], schema_format, elapsed, None, max_error_details)
}

fn summary(errors: &[ValidationErrorDetail]) -> String {
    match errors.len() {
        0 => "Validation passed".to_string(),
        1 => "Validation failed with 1 error".to_string(),
        n => format!("Validation failed with {n} errors"),
    }
}
