//! # Constraint Engine
//!
//! Evaluates data against JSON-Schema-shaped definitions.
//!
//! Schemas without `anyOf`/`oneOf` on any of their properties are handed to
//! the `jsonschema` compiler wholesale, which gives full keyword coverage and
//! one detail per violation.
//!
//! Schemas that do use property-level combinators go through
//! [`ConstraintEngine::validate_with_any_of_support`] instead. A compiled
//! `anyOf`/`oneOf` nested inside a larger object reports every failing branch
//! of every option, which buries the one fact a test author needs ("`tag`
//! matched none of its options"). The manual walk reports exactly one detail
//! per failing property:
//!
//! 1. Root type mismatch (`object`/`array`) short-circuits with a single
//!    detail at `root`.
//! 2. Each name in `required` absent from the data yields
//!    `Missing required field: {name}` at `/{name}`. Presence is what counts:
//!    a field holding `null` is present.
//! 3. Each property present in the data is checked by the first applicable
//!    branch: `anyOf`, then `oneOf`, then `type`.
//!
//! Required-field details always precede property details.
//!
//! Options and property sub-schemas are compiled as documents of their own.
//! When they hold a `$ref`, the root's `$defs` and `definitions` are copied
//! onto them first, so `#/$defs/...` pointers keep resolving.
//!
//! ## External references
//!
//! Every compilation uses [`LocalOnlyRetriever`], so a `$ref` to a remote or
//! file URI fails compilation instead of triggering I/O.

use std::sync::Arc;

use jsonschema::{Retrieve, Uri, Validator};
use respval_core::{ValidationErrorDetail, ROOT_PATH};
use serde_json::{json, Map, Value};

use crate::cache::ValidationCache;
use crate::error::ValidateError;

/// Message for a property whose `anyOf` options all failed.
pub const ANY_OF_MISMATCH: &str = "Value does not match any of the anyOf schemas";

/// Message for a property whose `oneOf` options all failed.
pub const ONE_OF_MISMATCH: &str = "Value does not match any of the oneOf schemas";

/// Used when the compiler rejects a value without a diagnostic.
pub const GENERIC_FAILURE: &str = "Validation failed";

/// Root keywords that hold reusable definitions.
const DEFINITION_KEYWORDS: [&str; 2] = ["$defs", "definitions"];

/// Retriever that refuses every external `$ref`.
///
/// Internal references (`#/...`) never reach a retriever; anything that does
/// would need network or file access, which the engine does not perform.
pub(crate) struct LocalOnlyRetriever;

impl Retrieve for LocalOnlyRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("External references not supported: {}", uri.as_str()).into())
    }
}

/// Compiles and evaluates schemas, memoizing compiled validators.
#[derive(Debug)]
pub struct ConstraintEngine {
    cache: ValidationCache,
}

impl Default for ConstraintEngine {
    fn default() -> Self {
        Self::new(respval_core::config::DEFAULT_CACHE_CAPACITY)
    }
}

impl ConstraintEngine {
    /// Create an engine whose cache holds at most `cache_capacity` validators.
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: ValidationCache::new(cache_capacity),
        }
    }

    /// The compiled-validator cache.
    pub fn cache(&self) -> &ValidationCache {
        &self.cache
    }

    /// Compile `schema`, or fetch it from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::SchemaCompile`] if the schema is not a valid
    /// JSON Schema or references an external document.
    pub fn compile(&self, schema: &Value) -> Result<Arc<Validator>, ValidateError> {
        let key = serde_json::to_string(schema).map_err(|e| ValidateError::SchemaCompile {
            reason: e.to_string(),
        })?;
        self.cache.get_or_try_insert(key, || {
            jsonschema::options()
                .with_retriever(LocalOnlyRetriever)
                .build(schema)
                .map_err(|e| ValidateError::SchemaCompile {
                    reason: e.to_string(),
                })
        })
    }

    /// Validate `data` against `schema`, choosing the evaluation strategy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::SchemaCompile`] if the schema or one of the
    /// property sub-schemas it needs cannot be compiled.
    pub fn validate(
        &self,
        data: &Value,
        schema: &Value,
    ) -> Result<Vec<ValidationErrorDetail>, ValidateError> {
        if has_property_combinators(schema) {
            tracing::debug!("property-level anyOf/oneOf present; using property walk");
            self.validate_with_any_of_support(data, schema)
        } else {
            self.validate_delegated(data, schema)
        }
    }

    /// Validate `data` with the compiled schema, one detail per violation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::SchemaCompile`] if `schema` does not compile.
    pub fn validate_delegated(
        &self,
        data: &Value,
        schema: &Value,
    ) -> Result<Vec<ValidationErrorDetail>, ValidateError> {
        let validator = self.compile(schema)?;
        Ok(validator.iter_errors(data).map(detail_from_error).collect())
    }

    /// Validate `data` with the property walk described in the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::SchemaCompile`] if a property sub-schema or
    /// combinator option needed for the walk does not compile.
    pub fn validate_with_any_of_support(
        &self,
        data: &Value,
        schema: &Value,
    ) -> Result<Vec<ValidationErrorDetail>, ValidateError> {
        if let Some(mismatch) = root_type_mismatch(data, schema) {
            return Ok(vec![mismatch]);
        }

        // Both checks only apply to objects, as in JSON Schema itself.
        let Some(object) = data.as_object() else {
            return Ok(Vec::new());
        };

        let mut errors = Vec::new();

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    errors.push(ValidationErrorDetail::new(
                        format!("/{name}"),
                        format!("Missing required field: {name}"),
                    ));
                }
            }
        }

        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(errors);
        };

        for (key, property) in properties {
            let Some(value) = object.get(key) else {
                continue;
            };
            if let Some(detail) = self.check_property(key, value, property, schema)? {
                errors.push(detail);
            }
        }

        Ok(errors)
    }

    /// Compile `sub`, a schema nested in `root`, as a standalone document.
    fn compile_subschema(&self, sub: &Value, root: &Value) -> Result<Arc<Validator>, ValidateError> {
        match with_root_definitions(sub, root) {
            Some(standalone) => self.compile(&standalone),
            None => self.compile(sub),
        }
    }

    /// Check one present property. At most one detail is produced.
    fn check_property(
        &self,
        key: &str,
        value: &Value,
        property: &Value,
        root: &Value,
    ) -> Result<Option<ValidationErrorDetail>, ValidateError> {
        let path = format!("/{key}");

        if let Some(options) = property.get("anyOf").and_then(Value::as_array) {
            for option in options {
                if self.compile_subschema(option, root)?.is_valid(value) {
                    return Ok(None);
                }
            }
            return Ok(Some(
                ValidationErrorDetail::new(path, ANY_OF_MISMATCH)
                    .with_expected(json!({ "anyOf": options }))
                    .with_actual(value.clone()),
            ));
        }

        if let Some(options) = property.get("oneOf").and_then(Value::as_array) {
            let mut matched = Vec::new();
            for (index, option) in options.iter().enumerate() {
                if self.compile_subschema(option, root)?.is_valid(value) {
                    matched.push(index);
                }
            }
            let message = match matched.len() {
                1 => return Ok(None),
                0 => ONE_OF_MISMATCH.to_string(),
                n => format!(
                    "Value matches {n} oneOf schemas (options {}); expected exactly one",
                    matched
                        .iter()
                        .map(usize::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            };
            return Ok(Some(
                ValidationErrorDetail::new(path, message)
                    .with_expected(json!({ "oneOf": options }))
                    .with_actual(value.clone()),
            ));
        }

        if property.get("type").is_some() {
            let validator = self.compile_subschema(property, root)?;
            if validator.is_valid(value) {
                return Ok(None);
            }
            let message = validator
                .iter_errors(value)
                .next()
                .map(|e| e.to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            return Ok(Some(
                ValidationErrorDetail::new(path, message).with_actual(value.clone()),
            ));
        }

        Ok(None)
    }
}

/// Returns true if any entry of `schema.properties` carries `anyOf` or `oneOf`.
pub fn has_property_combinators(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| {
            props
                .values()
                .any(|p| p.get("anyOf").is_some() || p.get("oneOf").is_some())
        })
}

/// A copy of `sub` carrying the definition containers of `root`, or `None`
/// when `sub` has no `$ref` or `root` has nothing to lend.
fn with_root_definitions(sub: &Value, root: &Value) -> Option<Value> {
    let map = sub.as_object()?;
    if !contains_ref(sub) {
        return None;
    }
    let mut standalone: Option<Map<String, Value>> = None;
    for keyword in DEFINITION_KEYWORDS {
        let Some(definitions) = root.get(keyword) else {
            continue;
        };
        if map.contains_key(keyword) {
            continue;
        }
        standalone
            .get_or_insert_with(|| map.clone())
            .insert(keyword.to_string(), definitions.clone());
    }
    standalone.map(Value::Object)
}

fn contains_ref(schema: &Value) -> bool {
    match schema {
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| key == "$ref" || contains_ref(value)),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}

/// JSON type name of a value, as JSON Schema spells it.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn root_type_mismatch(data: &Value, schema: &Value) -> Option<ValidationErrorDetail> {
    let expected = schema.get("type").and_then(Value::as_str)?;
    let matches = match expected {
        "object" => data.is_object(),
        "array" => data.is_array(),
        _ => return None,
    };
    if matches {
        return None;
    }
    Some(
        ValidationErrorDetail::new(
            ROOT_PATH,
            format!("Expected {expected}, got {}", json_type_name(data)),
        )
        .with_expected(json!(expected))
        .with_actual(data.clone()),
    )
}

fn detail_from_error(error: jsonschema::ValidationError<'_>) -> ValidationErrorDetail {
    let pointer = error.instance_path.to_string();
    let path = if pointer.is_empty() {
        ROOT_PATH.to_string()
    } else {
        pointer
    };
    let mut message = error.to_string();
    if message.is_empty() {
        message = GENERIC_FAILURE.to_string();
    }
    let detail = ValidationErrorDetail::new(path, message);
    // Containers are already described by the path; only scalars are worth echoing.
    match error.instance.as_ref() {
        Value::Object(_) | Value::Array(_) => detail,
        scalar => detail.with_actual(scalar.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn engine() -> ConstraintEngine {
        ConstraintEngine::new(32)
    }

    fn tagged_schema() -> Value {
        json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": {"type": "number"},
                "tag": {"anyOf": [{"type": "string"}, {"type": "null"}]}
            }
        })
    }

    #[test]
    fn test_any_of_null_option_matches() {
        let errors = engine()
            .validate(&json!({"id": 1, "tag": null}), &tagged_schema())
            .unwrap();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_any_of_no_option_matches() {
        let errors = engine()
            .validate(&json!({"id": 1, "tag": 5}), &tagged_schema())
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/tag");
        assert_eq!(errors[0].message, ANY_OF_MISMATCH);
        assert_eq!(errors[0].actual, Some(json!(5)));
    }

    #[test]
    fn test_missing_required_field() {
        let errors = engine()
            .validate(&json!({"tag": "x"}), &tagged_schema())
            .unwrap();
        assert_eq!(
            errors,
            vec![ValidationErrorDetail::new("/id", "Missing required field: id")]
        );
    }

    #[test]
    fn test_required_uses_presence_not_truthiness() {
        let schema = json!({
            "type": "object",
            "required": ["a"],
            "properties": {"b": {"oneOf": [{"type": "string"}]}}
        });
        let present = engine().validate(&json!({"a": null}), &schema).unwrap();
        assert!(present.is_empty(), "{present:?}");
        let absent = engine().validate(&json!({}), &schema).unwrap();
        assert_eq!(absent.len(), 1);
        assert_eq!(absent[0].message, "Missing required field: a");
    }

    #[test]
    fn test_required_errors_precede_property_errors() {
        let schema = json!({
            "type": "object",
            "required": ["z"],
            "properties": {
                "a": {"type": "string"},
                "t": {"anyOf": [{"type": "string"}]}
            }
        });
        let errors = engine()
            .validate(&json!({"a": 1, "t": 2}), &schema)
            .unwrap();
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/z", "/a", "/t"]);
    }

    #[test]
    fn test_one_of_exactly_one_match() {
        let schema = json!({
            "type": "object",
            "properties": {"v": {"oneOf": [{"type": "string"}, {"type": "integer"}]}}
        });
        assert!(engine().validate(&json!({"v": 3}), &schema).unwrap().is_empty());
    }

    #[test]
    fn test_one_of_zero_matches() {
        let schema = json!({
            "type": "object",
            "properties": {"v": {"oneOf": [{"type": "string"}, {"type": "integer"}]}}
        });
        let errors = engine().validate(&json!({"v": true}), &schema).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/v");
        assert_eq!(errors[0].message, ONE_OF_MISMATCH);
    }

    #[test]
    fn test_one_of_multiple_matches_names_options() {
        let schema = json!({
            "type": "object",
            "properties": {"v": {"oneOf": [
                {"type": "number"},
                {"type": "string"},
                {"type": "integer"}
            ]}}
        });
        let errors = engine().validate(&json!({"v": 3}), &schema).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/v");
        assert_eq!(
            errors[0].message,
            "Value matches 2 oneOf schemas (options 0, 2); expected exactly one"
        );
    }

    #[test]
    fn test_any_of_wins_over_one_of_and_type() {
        let schema = json!({
            "type": "object",
            "properties": {"v": {
                "anyOf": [{"type": "string"}],
                "oneOf": [{"type": "number"}],
                "type": "boolean"
            }}
        });
        let errors = engine().validate(&json!({"v": 1}), &schema).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, ANY_OF_MISMATCH);
    }

    #[test]
    fn test_type_branch_uses_compiler_message() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "x": {"anyOf": [{"type": "null"}]}
            }
        });
        let errors = engine().validate(&json!({"name": 7}), &schema).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/name");
        assert!(errors[0].message.contains("string"), "{}", errors[0].message);
    }

    #[test]
    fn test_options_resolve_root_defs() {
        let schema = json!({
            "$defs": {"Tag": {"type": "string"}},
            "type": "object",
            "properties": {
                "tag": {"anyOf": [{"$ref": "#/$defs/Tag"}, {"type": "null"}]}
            }
        });
        let engine = engine();
        assert!(engine.validate(&json!({"tag": "x"}), &schema).unwrap().is_empty());
        let errors = engine.validate(&json!({"tag": 5}), &schema).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, ANY_OF_MISMATCH);
    }

    #[test]
    fn test_one_of_and_type_branches_resolve_draft7_definitions() {
        let schema = json!({
            "definitions": {
                "Id": {"type": "integer"},
                "Name": {"type": "string", "minLength": 1}
            },
            "type": "object",
            "properties": {
                "id": {"oneOf": [{"$ref": "#/definitions/Id"}, {"type": "null"}]},
                "name": {"type": "string", "allOf": [{"$ref": "#/definitions/Name"}]}
            }
        });
        let engine = engine();
        assert!(engine
            .validate(&json!({"id": 3, "name": "a"}), &schema)
            .unwrap()
            .is_empty());
        let errors = engine
            .validate(&json!({"id": "3", "name": ""}), &schema)
            .unwrap();
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/id", "/name"]);
    }

    #[test]
    fn test_with_root_definitions_only_when_referenced() {
        let root = json!({"$defs": {"A": {}}});
        assert!(with_root_definitions(&json!({"type": "string"}), &root).is_none());
        assert!(with_root_definitions(&json!({"$ref": "#/$defs/A"}), &json!({})).is_none());
        let attached = with_root_definitions(&json!({"items": {"$ref": "#/$defs/A"}}), &root).unwrap();
        assert_eq!(attached["$defs"], json!({"A": {}}));
    }

    #[test]
    fn test_absent_properties_are_skipped() {
        let errors = engine()
            .validate_with_any_of_support(&json!({"id": 1}), &tagged_schema())
            .unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_root_type_mismatch_short_circuits() {
        let errors = engine().validate(&json!("nope"), &tagged_schema()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "root");
        assert_eq!(errors[0].message, "Expected object, got string");
    }

    #[test]
    fn test_root_array_mismatch() {
        let schema = json!({"type": "array", "properties": {"a": {"anyOf": []}}});
        let errors = engine()
            .validate_with_any_of_support(&json!({}), &schema)
            .unwrap();
        assert_eq!(errors[0].message, "Expected array, got object");
    }

    #[test]
    fn test_delegation_without_combinators() {
        let schema = json!({
            "type": "object",
            "required": ["id"],
            "properties": {"id": {"type": "integer"}},
            "additionalProperties": false
        });
        let errors = engine()
            .validate(&json!({"id": "1", "extra": true}), &schema)
            .unwrap();
        // Full compiler coverage: both the type error and additionalProperties.
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors.iter().any(|e| e.path == "/id"));
        assert!(errors.iter().any(|e| e.path == "root"));
    }

    #[test]
    fn test_invalid_property_schema_is_a_setup_error() {
        let schema = json!({
            "type": "object",
            "properties": {"v": {"anyOf": [{"type": "no-such-type"}]}}
        });
        let err = engine().validate(&json!({"v": 1}), &schema).unwrap_err();
        assert!(matches!(err, ValidateError::SchemaCompile { .. }));
    }

    #[test]
    fn test_external_ref_refused() {
        let schema = json!({"$ref": "https://example.com/schemas/user.json"});
        let engine = engine();
        let err = engine.compile(&schema).unwrap_err();
        assert!(matches!(err, ValidateError::SchemaCompile { .. }), "{err}");
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_compiled_validators_are_cached() {
        let engine = engine();
        let schema = tagged_schema();
        engine.validate(&json!({"id": 1, "tag": "a"}), &schema).unwrap();
        let after_first = engine.cache().stats();
        engine.validate(&json!({"id": 2, "tag": "b"}), &schema).unwrap();
        let after_second = engine.cache().stats();
        assert_eq!(after_first.len, after_second.len);
        assert!(after_second.hits > after_first.hits);
    }

    #[test]
    fn test_has_property_combinators() {
        assert!(has_property_combinators(&tagged_schema()));
        assert!(!has_property_combinators(&json!({"anyOf": [{}]})));
        assert!(!has_property_combinators(&json!({"properties": {"a": {"type": "string"}}})));
    }

    #[test]
    fn test_json_type_names() {
        assert_eq!(json_type_name(&json!(1)), "integer");
        assert_eq!(json_type_name(&json!(1.5)), "number");
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!([])), "array");
    }

    const TYPES: [&str; 6] = ["string", "number", "integer", "boolean", "null", "object"];

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            (-1000.0..1000.0f64).prop_map(|f| json!(f)),
            "[a-z]{0,6}".prop_map(Value::String),
            Just(json!({})),
            Just(json!([1])),
        ]
    }

    fn flat_schema_and_data() -> impl Strategy<Value = (Value, Value)> {
        let fields = prop::collection::btree_map(
            "[a-e]",
            (0..TYPES.len(), any::<bool>(), prop::option::of(leaf())),
            1..5,
        );
        fields.prop_map(|fields| {
            let mut properties = serde_json::Map::new();
            let mut required = Vec::new();
            let mut data = serde_json::Map::new();
            for (name, (ty, is_required, value)) in fields {
                properties.insert(name.clone(), json!({"type": TYPES[ty]}));
                if is_required {
                    required.push(json!(name.clone()));
                }
                if let Some(value) = value {
                    data.insert(name, value);
                }
            }
            (
                json!({"type": "object", "required": required, "properties": properties}),
                Value::Object(data),
            )
        })
    }

    proptest! {
        /// Without combinators, the compiler and the property walk agree on pass/fail.
        #[test]
        fn delegated_and_walk_agree((schema, data) in flat_schema_and_data()) {
            let engine = engine();
            let delegated = engine.validate_delegated(&data, &schema).unwrap();
            let walked = engine.validate_with_any_of_support(&data, &schema).unwrap();
            prop_assert_eq!(delegated.is_empty(), walked.is_empty());
        }

        /// Non-object data against an object schema always yields exactly one root error.
        #[test]
        fn root_mismatch_is_single(data in leaf().prop_filter("non-object", |v| !v.is_object())) {
            let errors = engine()
                .validate_with_any_of_support(&data, &json!({"type": "object", "required": ["a"]}))
                .unwrap();
            prop_assert_eq!(errors.len(), 1);
            prop_assert_eq!(errors[0].path.as_str(), "root");
        }
    }
}
