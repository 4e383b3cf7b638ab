//! # Validation Error Details and Schema Formats
//!
//! [`ValidationErrorDetail`] is the unit every validator in the workspace
//! emits. Its `path` is a JSON-pointer-like string (`/field`), a dotted path
//! for shape assertions (`user.age`), or one of the literals `root`,
//! `schema`, `input` for structural and setup failures.
//!
//! Details are kept in insertion order: required-field errors, then property
//! errors, then shape errors. Nothing in the workspace sorts them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Path used when a failure concerns the whole value.
pub const ROOT_PATH: &str = "root";

/// Path used for schema setup failures.
pub const SCHEMA_PATH: &str = "schema";

/// Path used for input guard failures (oversized or unserializable data).
pub const INPUT_PATH: &str = "input";

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Location of the failure within the validated value.
    pub path: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// The value the check expected, when it is meaningful to report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// The value actually found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl ValidationErrorDetail {
    /// Create a detail with a path and message only.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// Attach the expected value.
    #[must_use]
    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Attach the actual value.
    #[must_use]
    pub fn with_actual(mut self, actual: Value) -> Self {
        self.actual = Some(actual);
        self
    }
}

impl fmt::Display for ValidationErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The schema dialect a validation call was routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaFormat {
    /// A plain JSON Schema object.
    #[serde(rename = "JSON Schema")]
    JsonSchema,
    /// A runtime structural validator exposing `parse`.
    #[serde(rename = "Structural Schema")]
    Structural,
    /// An OpenAPI document loaded from a `.yaml`/`.yml` file.
    #[serde(rename = "YAML OpenAPI")]
    YamlOpenApi,
    /// An OpenAPI document given in memory or loaded from any other file.
    #[serde(rename = "JSON OpenAPI")]
    JsonOpenApi,
}

impl SchemaFormat {
    /// Display label, identical to the serialized form.
    pub fn label(self) -> &'static str {
        match self {
            Self::JsonSchema => "JSON Schema",
            Self::Structural => "Structural Schema",
            Self::YamlOpenApi => "YAML OpenAPI",
            Self::JsonOpenApi => "JSON OpenAPI",
        }
    }
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
