//! # End-to-End Validation
//!
//! Drives `ResponseValidator::validate_schema` through every schema
//! representation: inline JSON Schema, in-memory OpenAPI, schema files on
//! disk, structural schemas, and shape assertions layered on top.

use std::path::PathBuf;

use respval_schema::{
    ResponseValidator, SchemaFormat, ShapeAssertion, StructuralIssue, SupportedSchema,
    TypedSchema, ValidateOptions, ValidationErrorDetail, ValidatorConfig,
};
use serde_json::{json, Value};

fn tagged_schema() -> SupportedSchema {
    SupportedSchema::from_value(json!({
        "type": "object",
        "required": ["id"],
        "properties": {
            "id": {"type": "number"},
            "tag": {"anyOf": [{"type": "string"}, {"type": "null"}]}
        }
    }))
}

fn users_spec() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {"title": "users", "version": "1"},
        "paths": {
            "/users/{id}": {
                "get": {
                    "responses": {
                        "200": {
                            "description": "a user",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/User"}
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "User": {
                    "type": "object",
                    "required": ["id", "email"],
                    "properties": {
                        "id": {"type": "integer"},
                        "email": {"type": "string"}
                    }
                }
            }
        }
    })
}

fn write_fixture(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// =========================================================================
// Inline JSON Schema
// =========================================================================

#[test]
fn nullable_any_of_property_passes() {
    let validator = ResponseValidator::with_defaults();
    let result =
        validator.validate_schema(&json!({"id": 1, "tag": null}), &tagged_schema(), &ValidateOptions::new());
    assert!(result.success, "{result}");
    assert!(result.errors.is_empty());
    assert_eq!(result.schema_format, SchemaFormat::JsonSchema);
    assert!(result.schema.is_some());
}

#[test]
fn missing_required_field_is_reported() {
    let validator = ResponseValidator::with_defaults();
    let result =
        validator.validate_schema(&json!({"tag": "x"}), &tagged_schema(), &ValidateOptions::new());
    assert!(!result.success);
    assert!(result
        .errors
        .contains(&ValidationErrorDetail::new("/id", "Missing required field: id")));
}

#[test]
fn success_tracks_error_list() {
    let validator = ResponseValidator::with_defaults();
    for data in [json!({"id": 1}), json!({"id": "1"}), json!([]), json!({"tag": 3})] {
        let result = validator.validate_schema(&data, &tagged_schema(), &ValidateOptions::new());
        assert_eq!(result.success, result.errors.is_empty(), "{data}");
        assert_eq!(
            result.ui_data.as_ref().unwrap().error_details.is_some(),
            !result.success
        );
    }
}

// =========================================================================
// OpenAPI
// =========================================================================

#[test]
fn openapi_ref_is_resolved_and_enforced() {
    let validator = ResponseValidator::with_defaults();
    let schema = SupportedSchema::from_value(users_spec());
    let options = ValidateOptions::new()
        .with_endpoint("/users/{id}")
        .with_method("GET")
        .with_status(200);

    let ok = validator.validate_schema(&json!({"id": 7, "email": "a@b.c"}), &schema, &options);
    assert!(ok.success, "{ok}");
    assert_eq!(ok.schema_format, SchemaFormat::JsonOpenApi);
    assert_eq!(ok.schema.as_ref().unwrap()["required"], json!(["id", "email"]));

    let bad = validator.validate_schema(&json!({"id": 7}), &schema, &options);
    assert!(!bad.success);
    assert_eq!(bad.errors.len(), 1);
}

#[test]
fn openapi_concrete_path_matches_template() {
    let validator = ResponseValidator::with_defaults();
    let schema = SupportedSchema::from_value(users_spec());
    let options = ValidateOptions::new().with_path("/users/42").with_method("get");
    let result = validator.validate_schema(&json!({"id": "x", "email": "e"}), &schema, &options);
    assert!(!result.success);
    assert_eq!(result.errors[0].path, "/id");
}

#[test]
fn openapi_unknown_endpoint_degrades_to_fallback() {
    let validator = ResponseValidator::with_defaults();
    let schema = SupportedSchema::from_value(users_spec());
    let options = ValidateOptions::new().with_path("/nope").with_method("get");

    let result = validator.validate_schema(&json!({"status": 200}), &schema, &options);
    assert!(result.success, "{result}");
    assert_eq!(result.schema, Some(respval_schema::fallback_schema()));

    let missing_status = validator.validate_schema(&json!({"data": {}}), &schema, &options);
    assert!(!missing_status.success);
}

// =========================================================================
// Schema files
// =========================================================================

#[test]
fn yaml_openapi_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "users.yaml",
        r##"
openapi: 3.0.3
paths:
  /users/{id}:
    get:
      responses:
        200:
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/User'
components:
  schemas:
    User:
      type: object
      required: [id]
      properties:
        id: {type: integer}
        nickname: {type: string, nullable: true}
"##,
    );
    let validator = ResponseValidator::with_defaults();
    let schema = SupportedSchema::file(&path);
    let options = ValidateOptions::new().with_path("/users/{userId}").with_method("GET");

    let result = validator.validate_schema(&json!({"id": 1, "nickname": null}), &schema, &options);
    assert!(result.success, "{result}");
    assert_eq!(result.schema_format, SchemaFormat::YamlOpenApi);
}

#[test]
fn json_schema_file_resolved_against_schema_root() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(&dir, "item.json", r#"{"type": "object", "required": ["sku"]}"#);
    let validator = ResponseValidator::new(ValidatorConfig {
        schema_root: Some(dir.path().to_path_buf()),
        ..ValidatorConfig::default()
    });
    let schema = SupportedSchema::file("item.json");

    let result = validator.validate_schema(&json!({"sku": "A1"}), &schema, &ValidateOptions::new());
    assert!(result.success, "{result}");
    // Routed by extension, evaluated as a plain JSON Schema.
    assert_eq!(result.schema_format, SchemaFormat::JsonOpenApi);
}

#[test]
fn disallowed_extension_is_a_schema_error() {
    let validator = ResponseValidator::with_defaults();
    let result = validator.validate_schema(
        &json!({}),
        &SupportedSchema::file("/etc/passwd"),
        &ValidateOptions::new(),
    );
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].path, "schema");
    assert!(result.errors[0]
        .message
        .starts_with("failed to load schema file: invalid file extension"));
    assert!(result.schema.is_none());
}

#[test]
fn missing_schema_file_is_a_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let validator = ResponseValidator::with_defaults();
    let result = validator.validate_schema(
        &json!({}),
        &SupportedSchema::file(dir.path().join("absent.yml")),
        &ValidateOptions::new(),
    );
    assert_eq!(result.errors[0].path, "schema");
    assert!(result.errors[0].message.contains("schema file not found"));
}

// =========================================================================
// Structural schemas
// =========================================================================

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
#[allow(dead_code)]
struct Order {
    id: u64,
    total: f64,
}

#[test]
fn typed_structural_schema() {
    let validator = ResponseValidator::with_defaults();
    let schema = SupportedSchema::structural(TypedSchema::<Order>::new().unwrap());

    let ok = validator.validate_schema(&json!({"id": 1, "total": 9.5}), &schema, &ValidateOptions::new());
    assert!(ok.success, "{ok}");
    assert_eq!(ok.schema_format, SchemaFormat::Structural);

    let bad = validator.validate_schema(&json!({"id": -1, "total": 9.5}), &schema, &ValidateOptions::new());
    assert!(!bad.success);
    assert_eq!(bad.errors[0].path, "/id");
}

#[test]
fn panicking_structural_schema_is_contained() {
    let validator = ResponseValidator::with_defaults();
    let schema = SupportedSchema::structural(respval_schema::FnSchema::new(
        "broken",
        |_: &Value| -> Result<(), Vec<StructuralIssue>> { panic!("index out of range") },
    ));
    let result = validator.validate_schema(&json!({}), &schema, &ValidateOptions::new());
    assert!(!result.success);
    assert_eq!(result.errors[0].path, "schema");
    assert!(result.errors[0].message.contains("index out of range"));
}

// =========================================================================
// Shape assertions and input guard
// =========================================================================

#[test]
fn shape_predicate_failure_on_nested_field() {
    let validator = ResponseValidator::with_defaults();
    let shape = ShapeAssertion::new().nested(
        "user",
        ShapeAssertion::new().check("age", |v| v.and_then(Value::as_f64).is_some_and(|a| a >= 18.0)),
    );
    let result = validator.validate_schema(
        &json!({"user": {"age": 16}}),
        &SupportedSchema::from_value(json!({"type": "object"})),
        &ValidateOptions::new().with_shape(shape),
    );
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].path, "user.age");
}

#[test]
fn shape_errors_follow_schema_errors() {
    let validator = ResponseValidator::with_defaults();
    let shape = ShapeAssertion::new().equals("tag", "y");
    let result = validator.validate_schema(
        &json!({"tag": "x"}),
        &tagged_schema(),
        &ValidateOptions::new().with_shape(shape),
    );
    let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["/id", "tag"]);
}

#[test]
fn oversized_input_is_rejected() {
    let validator = ResponseValidator::with_defaults();
    let big = json!({"blob": "a".repeat(1024 * 1024)});
    let result = validator.validate_schema(&big, &tagged_schema(), &ValidateOptions::new());
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].path, "input");
    assert!(result.errors[0].message.contains("1048576"));
}

#[test]
fn validator_shared_across_threads() {
    let validator = std::sync::Arc::new(ResponseValidator::with_defaults());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let validator = std::sync::Arc::clone(&validator);
            std::thread::spawn(move || {
                validator
                    .validate_schema(&json!({"id": i}), &tagged_schema(), &ValidateOptions::new())
                    .success
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
