//! # Structural Schemas
//!
//! A structural schema is a runtime validator object: instead of being
//! compiled as a JSON Schema, it is asked to `parse` the value directly and
//! reports its own issues. [`TypedSchema`] adapts any Rust type that is
//! `Deserialize + JsonSchema`; [`FnSchema`] wraps a closure.

use std::fmt;
use std::marker::PhantomData;

use jsonschema::Validator;
use respval_core::{ValidationErrorDetail, ROOT_PATH};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::engine::LocalOnlyRetriever;
use crate::error::ValidateError;

/// One problem reported by a structural schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralIssue {
    /// Segments leading to the offending value; empty for the value itself.
    pub path: Vec<String>,
    /// Description of the problem.
    pub message: String,
}

impl StructuralIssue {
    /// Create an issue at `path`.
    pub fn new<I, S>(path: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// Create an issue concerning the whole value.
    pub fn root(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    /// `/a/b` for a non-empty path, `root` otherwise.
    pub fn pointer(&self) -> String {
        if self.path.is_empty() {
            ROOT_PATH.to_string()
        } else {
            self.path.iter().map(|s| format!("/{s}")).collect()
        }
    }
}

impl From<StructuralIssue> for ValidationErrorDetail {
    fn from(issue: StructuralIssue) -> Self {
        ValidationErrorDetail::new(issue.pointer(), issue.message)
    }
}

/// A validator that checks values by parsing them.
pub trait StructuralSchema: Send + Sync {
    /// Parse `value`, returning every issue found.
    fn parse(&self, value: &Value) -> Result<(), Vec<StructuralIssue>>;

    /// A JSON description of the schema, reported as the evaluated schema.
    fn describe(&self) -> Value;
}

/// Structural schema backed by a Rust type.
///
/// The type's generated JSON Schema is checked first so that issues carry
/// paths; a value passing it is then deserialized, which catches anything
/// the generated schema cannot express (custom `Deserialize` impls).
pub struct TypedSchema<T> {
    schema: Value,
    validator: Validator,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for TypedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSchema")
            .field("type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned + JsonSchema> TypedSchema<T> {
    /// Generate and compile the JSON Schema for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::SchemaCompile`] if the generated schema does
    /// not compile.
    pub fn new() -> Result<Self, ValidateError> {
        let schema = serde_json::to_value(schemars::schema_for!(T)).map_err(|e| {
            ValidateError::SchemaCompile {
                reason: e.to_string(),
            }
        })?;
        let validator = jsonschema::options()
            .with_retriever(LocalOnlyRetriever)
            .build(&schema)
            .map_err(|e| ValidateError::SchemaCompile {
                reason: e.to_string(),
            })?;
        Ok(Self {
            schema,
            validator,
            _marker: PhantomData,
        })
    }
}

impl<T: DeserializeOwned + JsonSchema> StructuralSchema for TypedSchema<T> {
    fn parse(&self, value: &Value) -> Result<(), Vec<StructuralIssue>> {
        let issues: Vec<StructuralIssue> = self
            .validator
            .iter_errors(value)
            .map(|e| StructuralIssue {
                path: pointer_segments(&e.instance_path.to_string()),
                message: e.to_string(),
            })
            .collect();
        if !issues.is_empty() {
            return Err(issues);
        }
        T::deserialize(value)
            .map(drop)
            .map_err(|e| vec![StructuralIssue::root(e.to_string())])
    }

    fn describe(&self) -> Value {
        self.schema.clone()
    }
}

/// Structural schema backed by a closure.
pub struct FnSchema<F> {
    name: String,
    check: F,
}

impl<F> FnSchema<F>
where
    F: Fn(&Value) -> Result<(), Vec<StructuralIssue>> + Send + Sync,
{
    /// Wrap `check`; `name` appears in [`StructuralSchema::describe`].
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> fmt::Debug for FnSchema<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSchema").field("name", &self.name).finish()
    }
}

impl<F> StructuralSchema for FnSchema<F>
where
    F: Fn(&Value) -> Result<(), Vec<StructuralIssue>> + Send + Sync,
{
    fn parse(&self, value: &Value) -> Result<(), Vec<StructuralIssue>> {
        (self.check)(value)
    }

    fn describe(&self) -> Value {
        json!({ "title": self.name })
    }
}

fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}
