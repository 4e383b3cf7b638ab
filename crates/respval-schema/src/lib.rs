//! # respval-schema: Response Schema Validation Engine
//!
//! Validates a runtime JSON value (typically an HTTP response body) against
//! any of several schema representations and returns one uniform
//! [`ValidationResult`].
//!
//! ## Responsibilities
//!
//! - **Format detection:** route inline JSON Schema, OpenAPI documents,
//!   structural schemas and schema files ([`detect`]).
//! - **OpenAPI extraction:** locate and dereference one response schema by
//!   endpoint, method and status ([`openapi`]).
//! - **Constraint evaluation:** delegate to a compiled JSON Schema, or walk
//!   properties when `anyOf`/`oneOf` need per-property diagnostics
//!   ([`engine`]), memoized by a bounded [`ValidationCache`].
//! - **Shape assertions:** literal, predicate and nested checks appended to
//!   the schema result ([`shape`]).
//!
//! ## Design
//!
//! Validation failures are data. [`ResponseValidator::validate_schema`]
//! returns a [`ValidationResult`] in every case; setup failures become a
//! single detail at `input` or `schema`.
//!
//! ```
//! use respval_schema::{ResponseValidator, SupportedSchema, ValidateOptions};
//! use serde_json::json;
//!
//! let validator = ResponseValidator::with_defaults();
//! let schema = SupportedSchema::from_value(json!({
//!     "type": "object",
//!     "required": ["id"],
//!     "properties": {"id": {"type": "number"}}
//! }));
//! let result = validator.validate_schema(&json!({"id": 1}), &schema, &ValidateOptions::new());
//! assert!(result.success);
//! ```

pub mod cache;
pub mod detect;
pub mod engine;
pub mod error;
pub mod loader;
pub mod openapi;
pub mod processors;
pub mod report;
pub mod shape;
pub mod structural;
pub mod validator;

// Re-export primary types.
pub use cache::{CacheStats, ValidationCache};
pub use detect::{detect_format, SupportedSchema};
pub use engine::ConstraintEngine;
pub use error::ValidateError;
pub use loader::{load_schema_file, yaml_to_json_value, SchemaFileError};
pub use openapi::{extract_openapi_schema, fallback_schema, resolve_openapi_ref, OpenApiError};
pub use processors::{OpenApiTarget, ProcessedSchema};
pub use report::{build_error_result, build_result, UiData, ValidationResult};
pub use shape::{validate_shape, ShapeAssertion, ShapeRule};
pub use structural::{FnSchema, StructuralIssue, StructuralSchema, TypedSchema};
pub use validator::{ResponseValidator, ValidateOptions};

pub use respval_core::{SchemaFormat, ValidationErrorDetail, ValidatorConfig};
