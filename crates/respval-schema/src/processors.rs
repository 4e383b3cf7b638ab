//! # Schema Processors
//!
//! One processor per [`SupportedSchema`] variant. Each returns the
//! constraint violations it found plus the schema it actually evaluated
//! (after OpenAPI extraction and `$ref` inlining), or a [`ValidateError`] if
//! it could not evaluate anything.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use respval_core::ValidationErrorDetail;
use serde_json::Value;

use crate::detect::SupportedSchema;
use crate::engine::{json_type_name, ConstraintEngine};
use crate::error::{panic_message, ValidateError};
use crate::loader::load_schema_file;
use crate::openapi::{extract_openapi_schema, is_openapi_document, DEFAULT_STATUS};
use crate::structural::StructuralSchema;

/// Output of a processor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessedSchema {
    /// Constraint violations, in the order found.
    pub validation_errors: Vec<ValidationErrorDetail>,
    /// The schema evaluated, for reporting.
    pub processed_schema: Option<Value>,
}

/// Which OpenAPI response to validate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenApiTarget<'a> {
    /// Path template or concrete path.
    pub endpoint: Option<&'a str>,
    /// HTTP method, any case.
    pub method: Option<&'a str>,
    /// Response status code.
    pub status: u16,
}

impl Default for OpenApiTarget<'_> {
    fn default() -> Self {
        Self {
            endpoint: None,
            method: None,
            status: DEFAULT_STATUS,
        }
    }
}

/// Route `schema` to its processor.
///
/// # Errors
///
/// Returns whatever setup failure the selected processor hits.
pub fn process(
    engine: &ConstraintEngine,
    data: &Value,
    schema: &SupportedSchema,
    target: OpenApiTarget<'_>,
    schema_root: Option<&Path>,
) -> Result<ProcessedSchema, ValidateError> {
    match schema {
        SupportedSchema::File(path) => process_file(engine, data, path, target, schema_root),
        SupportedSchema::Structural(structural) => process_structural(data, structural.as_ref()),
        SupportedSchema::OpenApi(spec) => process_openapi(engine, data, spec, target),
        SupportedSchema::JsonSchema(schema) => process_json_schema(engine, data, schema),
    }
}

/// Load a schema file, then process it as OpenAPI or JSON Schema depending
/// on its content.
///
/// # Errors
///
/// [`ValidateError::SchemaFile`] if the file cannot be loaded, otherwise as
/// [`process_openapi`] / [`process_json_schema`].
pub fn process_file(
    engine: &ConstraintEngine,
    data: &Value,
    path: &Path,
    target: OpenApiTarget<'_>,
    schema_root: Option<&Path>,
) -> Result<ProcessedSchema, ValidateError> {
    let document = load_schema_file(path, schema_root)?;
    if is_openapi_document(&document) {
        process_openapi(engine, data, &document, target)
    } else {
        process_json_schema(engine, data, &document)
    }
}

/// Extract the targeted response schema and validate against it.
///
/// Extraction itself never fails; see [`extract_openapi_schema`].
///
/// # Errors
///
/// [`ValidateError::SchemaCompile`] if the extracted schema does not compile.
pub fn process_openapi(
    engine: &ConstraintEngine,
    data: &Value,
    spec: &Value,
    target: OpenApiTarget<'_>,
) -> Result<ProcessedSchema, ValidateError> {
    let schema = extract_openapi_schema(spec, target.endpoint, target.method, target.status);
    process_json_schema(engine, data, &schema)
}

/// Validate against an inline JSON Schema.
///
/// # Errors
///
/// [`ValidateError::SchemaCompile`] if `schema` is neither an object nor a
/// boolean, or does not compile.
pub fn process_json_schema(
    engine: &ConstraintEngine,
    data: &Value,
    schema: &Value,
) -> Result<ProcessedSchema, ValidateError> {
    if !(schema.is_object() || schema.is_boolean()) {
        return Err(ValidateError::SchemaCompile {
            reason: format!(
                "schema must be a JSON object or boolean, got {}",
                json_type_name(schema)
            ),
        });
    }
    Ok(ProcessedSchema {
        validation_errors: engine.validate(data, schema)?,
        processed_schema: Some(schema.clone()),
    })
}

/// Validate by asking a structural schema to parse the data.
///
/// # Errors
///
/// [`ValidateError::StructuralPanic`] if `parse` or `describe` panics.
pub fn process_structural(
    data: &Value,
    schema: &dyn StructuralSchema,
) -> Result<ProcessedSchema, ValidateError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| (schema.parse(data), schema.describe())))
        .map_err(|payload| ValidateError::StructuralPanic(panic_message(payload.as_ref())))?;
    let (parsed, described) = outcome;
    Ok(ProcessedSchema {
        validation_errors: parsed
            .err()
            .unwrap_or_default()
            .into_iter()
            .map(ValidationErrorDetail::from)
            .collect(),
        processed_schema: Some(described),
    })
}
