//! # Shape Assertions
//!
//! Ad-hoc structural checks that need no schema: each key of a
//! [`ShapeAssertion`] is either compared for equality, handed to a
//! predicate, or recursed into. Details use dotted paths (`user.age`) and are
//! appended after whatever the schema itself reported.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use respval_core::{safe_stringify, ValidationErrorDetail};
use serde_json::Value;

use crate::error::panic_message;

/// Message for a predicate that returned `false`.
pub const PREDICATE_FAILED: &str = "Custom validation failed";

/// Message for a nested assertion over a non-container value.
pub const NESTED_NOT_OBJECT: &str = "Expected object for nested shape validation";

type Predicate = Arc<dyn Fn(Option<&Value>) -> Result<bool, String> + Send + Sync>;

/// Check applied to one field.
#[derive(Clone)]
pub enum ShapeRule {
    /// The field must equal this value.
    Equals(Value),
    /// The field must satisfy the predicate. The predicate receives `None`
    /// for an absent field; `Ok(false)`, `Err(_)` and a panic all fail.
    Predicate(Predicate),
    /// The field must be an object (or array) satisfying the inner assertion.
    Nested(ShapeAssertion),
}

impl fmt::Debug for ShapeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Nested(inner) => f.debug_tuple("Nested").field(inner).finish(),
        }
    }
}

/// Ordered set of field checks.
#[derive(Debug, Clone, Default)]
pub struct ShapeAssertion {
    rules: Vec<(String, ShapeRule)>,
}

impl ShapeAssertion {
    /// An assertion with no checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `expected`.
    #[must_use]
    pub fn equals(self, key: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.rule(key, ShapeRule::Equals(expected.into()))
    }

    /// Require `key` to satisfy `predicate`.
    #[must_use]
    pub fn check<F>(self, key: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        self.check_with(key, move |v| Ok(predicate(v)))
    }

    /// Require `key` to satisfy a fallible predicate; `Err(message)` is
    /// reported verbatim.
    #[must_use]
    pub fn check_with<F>(self, key: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&Value>) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.rule(key, ShapeRule::Predicate(Arc::new(predicate)))
    }

    /// Recurse into `key` with `inner`.
    #[must_use]
    pub fn nested(self, key: impl Into<String>, inner: ShapeAssertion) -> Self {
        self.rule(key, ShapeRule::Nested(inner))
    }

    /// Append an arbitrary rule.
    #[must_use]
    pub fn rule(mut self, key: impl Into<String>, rule: ShapeRule) -> Self {
        self.rules.push((key.into(), rule));
        self
    }

    /// Build an assertion from JSON: objects become nested assertions, every
    /// other value an equality check. Returns `None` unless `value` is an
    /// object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let rules = object
            .iter()
            .map(|(key, expected)| {
                let rule = match Self::from_value(expected) {
                    Some(inner) => ShapeRule::Nested(inner),
                    None => ShapeRule::Equals(expected.clone()),
                };
                (key.clone(), rule)
            })
            .collect();
        Some(Self { rules })
    }

    /// The checks, in order.
    pub fn rules(&self) -> &[(String, ShapeRule)] {
        &self.rules
    }

    /// Returns true if there are no checks.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Run `assertion` against `data`, prefixing every path with `base_path`.
pub fn validate_shape(
    data: &Value,
    assertion: &ShapeAssertion,
    base_path: &str,
) -> Vec<ValidationErrorDetail> {
    let mut errors = Vec::new();
    for (key, rule) in &assertion.rules {
        let path = if base_path.is_empty() {
            key.clone()
        } else {
            format!("{base_path}.{key}")
        };
        let actual = field(data, key);
        match rule {
            ShapeRule::Predicate(predicate) => {
                let outcome = catch_unwind(AssertUnwindSafe(|| predicate(actual)));
                let message = match outcome {
                    Ok(Ok(true)) => continue,
                    Ok(Ok(false)) => PREDICATE_FAILED.to_string(),
                    Ok(Err(message)) => message,
                    Err(payload) => panic_message(payload.as_ref()),
                };
                let mut detail = ValidationErrorDetail::new(path, message);
                detail.actual = actual.cloned();
                errors.push(detail);
            }
            ShapeRule::Nested(inner) => match actual {
                Some(child @ (Value::Object(_) | Value::Array(_))) => {
                    errors.extend(validate_shape(child, inner, &path));
                }
                _ => {
                    let mut detail = ValidationErrorDetail::new(path, NESTED_NOT_OBJECT);
                    detail.actual = actual.cloned();
                    errors.push(detail);
                }
            },
            ShapeRule::Equals(expected) => {
                if actual == Some(expected) {
                    continue;
                }
                let shown = actual.map_or_else(|| "undefined".to_string(), |v| safe_stringify(v));
                let mut detail = ValidationErrorDetail::new(
                    path,
                    format!("Expected {}, got {shown}", safe_stringify(expected)),
                )
                .with_expected(expected.clone());
                detail.actual = actual.cloned();
                errors.push(detail);
            }
        }
    }
    errors
}

fn field<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    match data {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
