//! # Format Detection
//!
//! [`SupportedSchema`] is the closed set of schema inputs the validator
//! accepts. Probing a raw JSON value (is it an OpenAPI document?) happens
//! once, in [`SupportedSchema::from_value`]; everything downstream routes by
//! exhaustive `match`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use respval_core::SchemaFormat;
use serde_json::Value;

use crate::loader::is_yaml_path;
use crate::openapi::is_openapi_document;
use crate::structural::StructuralSchema;

/// A schema in any of the accepted representations.
#[derive(Clone)]
pub enum SupportedSchema {
    /// An inline JSON Schema object.
    JsonSchema(Value),
    /// A runtime structural validator.
    Structural(Arc<dyn StructuralSchema>),
    /// An in-memory OpenAPI or Swagger document.
    OpenApi(Value),
    /// A `.json`, `.yaml` or `.yml` file holding either of the above.
    File(PathBuf),
}

impl SupportedSchema {
    /// Classify an in-memory document: a top-level `openapi` or `swagger`
    /// key makes it an OpenAPI document, anything else a JSON Schema.
    pub fn from_value(value: Value) -> Self {
        if is_openapi_document(&value) {
            Self::OpenApi(value)
        } else {
            Self::JsonSchema(value)
        }
    }

    /// A schema file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// A structural schema.
    pub fn structural<S: StructuralSchema + 'static>(schema: S) -> Self {
        Self::Structural(Arc::new(schema))
    }

    /// The format label this schema is routed under.
    pub fn format(&self) -> SchemaFormat {
        detect_format(self)
    }
}

impl fmt::Debug for SupportedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JsonSchema(v) => f.debug_tuple("JsonSchema").field(v).finish(),
            Self::Structural(_) => f.write_str("Structural(..)"),
            Self::OpenApi(_) => f.write_str("OpenApi(..)"),
            Self::File(p) => f.debug_tuple("File").field(p).finish(),
        }
    }
}

impl From<Value> for SupportedSchema {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<&Path> for SupportedSchema {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<PathBuf> for SupportedSchema {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

/// The format label for `schema`.
///
/// File labels are chosen by extension alone (`.yaml`/`.yml` → YAML OpenAPI,
/// otherwise JSON OpenAPI); the file is not opened here.
pub fn detect_format(schema: &SupportedSchema) -> SchemaFormat {
    let format = match schema {
        SupportedSchema::File(path) if is_yaml_path(path) => SchemaFormat::YamlOpenApi,
        SupportedSchema::File(_) | SupportedSchema::OpenApi(_) => SchemaFormat::JsonOpenApi,
        SupportedSchema::Structural(_) => SchemaFormat::Structural,
        SupportedSchema::JsonSchema(_) => SchemaFormat::JsonSchema,
    };
    tracing::debug!(format = %format, "detected schema format");
    format
}
