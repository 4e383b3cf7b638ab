//! # OpenAPI Response Schema Extraction
//!
//! Pulls the JSON Schema for one response (`endpoint` × `method` × `status`)
//! out of an OpenAPI 3.x or Swagger 2.0 document held as a `serde_json::Value`.
//!
//! ## Lookup order
//!
//! - **Path**: exact key; then the same key with every `{param}` segment
//!   normalized to `{id}`; then a concrete path such as `/users/42` matched
//!   against templates (`/users/{id}`), preferring the template with the most
//!   literal segments.
//! - **Method**: lower-cased.
//! - **Response**: exact status, then its range (`2XX`), then `default`. A
//!   response given as `$ref` is followed.
//! - **Media type**: `application/json`, then any `application/json;…`
//!   variant, then the first `*+json` type. Swagger 2.0 responses carry the
//!   schema directly.
//!
//! The extracted schema is dereferenced: internal `$ref`s are inlined
//! recursively (a reference back into its own expansion becomes `{}`), and
//! OpenAPI 3.0 `nullable: true` becomes a `type` union with `"null"`. Each
//! reference is expanded once and reused; an expansion larger than
//! [`MAX_DEREFERENCED_NODES`] values is refused.
//!
//! ## Degradation
//!
//! [`extract_openapi_schema`] never fails. Without an endpoint or method it
//! returns [`fallback_schema`] directly; on any lookup or reference error it
//! logs a warning and returns the same fallback, so a broken spec weakens the
//! check instead of aborting the assertion.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Status used when the caller does not name one.
pub const DEFAULT_STATUS: u16 = 200;

/// Maximum number of `$ref` hops followed for a response object.
const MAX_RESPONSE_REF_HOPS: usize = 16;

/// Maximum number of JSON values in a dereferenced schema.
pub const MAX_DEREFERENCED_NODES: usize = 100_000;

/// Errors raised while locating a response schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenApiError {
    /// The document has no `paths` object.
    #[error("OpenAPI document has no paths object")]
    MissingPaths,

    /// No path item matches the endpoint.
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    /// The path item has no operation for the method.
    #[error("method not found: {method} {endpoint}")]
    MethodNotFound {
        /// Requested endpoint.
        endpoint: String,
        /// Requested method, lower-cased.
        method: String,
    },

    /// The operation declares no response for the status, its range, or `default`.
    #[error("response not found for status {status}: {method} {endpoint}")]
    ResponseNotFound {
        /// Requested endpoint.
        endpoint: String,
        /// Requested method, lower-cased.
        method: String,
        /// Requested status code.
        status: u16,
    },

    /// The response exists but declares no JSON schema.
    #[error("no JSON schema for status {status}: {method} {endpoint}")]
    SchemaNotFound {
        /// Requested endpoint.
        endpoint: String,
        /// Requested method, lower-cased.
        method: String,
        /// Requested status code.
        status: u16,
    },

    /// A `$ref` points outside the document.
    #[error("External references not supported: {0}")]
    ExternalRef(String),

    /// A `$ref` pointer does not resolve within the document.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// A chain of response `$ref`s loops or is too long.
    #[error("reference chain too deep at {0}")]
    RefChainTooDeep(String),

    /// Inlining references would produce more than `limit` values.
    #[error("dereferenced schema exceeds {limit} values")]
    SchemaTooLarge {
        /// The node budget that was exceeded.
        limit: usize,
    },
}

/// The generic schema used when no specific response schema can be extracted.
pub fn fallback_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "status": {"type": "number"},
            "data": {"type": "object"}
        },
        "required": ["status"]
    })
}

/// Returns true if `document` declares itself as OpenAPI or Swagger.
pub fn is_openapi_document(document: &Value) -> bool {
    document.get("openapi").is_some() || document.get("swagger").is_some()
}

/// Extract the response schema, degrading to [`fallback_schema`] on any failure.
pub fn extract_openapi_schema(
    spec: &Value,
    endpoint: Option<&str>,
    method: Option<&str>,
    status: u16,
) -> Value {
    let (Some(endpoint), Some(method)) = (endpoint, method) else {
        tracing::debug!("endpoint or method not given; using fallback response schema");
        return fallback_schema();
    };
    match try_extract_openapi_schema(spec, endpoint, method, status) {
        Ok(schema) => schema,
        Err(err) => {
            tracing::warn!(
                endpoint,
                method,
                status,
                error = %err,
                "OpenAPI schema extraction failed; using fallback schema"
            );
            fallback_schema()
        }
    }
}

/// Extract and dereference the response schema.
///
/// # Errors
///
/// Returns the first [`OpenApiError`] met while walking
/// `paths → method → responses → content → schema` or resolving references.
pub fn try_extract_openapi_schema(
    spec: &Value,
    endpoint: &str,
    method: &str,
    status: u16,
) -> Result<Value, OpenApiError> {
    let paths = spec
        .get("paths")
        .and_then(Value::as_object)
        .ok_or(OpenApiError::MissingPaths)?;

    let path_item = find_path_item(paths, endpoint)
        .ok_or_else(|| OpenApiError::EndpointNotFound(endpoint.to_string()))?;

    let method = method.to_ascii_lowercase();
    let operation = path_item
        .get(&method)
        .ok_or_else(|| OpenApiError::MethodNotFound {
            endpoint: endpoint.to_string(),
            method: method.clone(),
        })?;

    let response = find_response(operation, status).ok_or_else(|| {
        OpenApiError::ResponseNotFound {
            endpoint: endpoint.to_string(),
            method: method.clone(),
            status,
        }
    })?;
    let response = follow_response_refs(response, spec)?;

    let schema = response_schema(response).ok_or_else(|| OpenApiError::SchemaNotFound {
        endpoint: endpoint.to_string(),
        method: method.clone(),
        status,
    })?;

    Dereferencer::new(spec).inline(schema)
}

/// Resolve an internal `$ref` (`#/a/b/c`) against the document root.
///
/// Segments are percent-decoded, then JSON-pointer unescaped (`~1` → `/`,
/// `~0` → `~`). Array elements are addressed by index.
///
/// # Errors
///
/// - [`OpenApiError::ExternalRef`] if `reference` does not start with `#/`.
/// - [`OpenApiError::RefNotFound`] if any segment is missing.
pub fn resolve_openapi_ref<'a>(reference: &str, spec: &'a Value) -> Result<&'a Value, OpenApiError> {
    let pointer = reference
        .strip_prefix("#/")
        .ok_or_else(|| OpenApiError::ExternalRef(reference.to_string()))?;

    let mut current = spec;
    for raw in pointer.split('/') {
        let segment = unescape_segment(raw);
        let next = match current {
            Value::Object(map) => map.get(&segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| OpenApiError::RefNotFound(reference.to_string()))?;
    }
    Ok(current)
}

// ---------------------------------------------------------------------------
// Path matching
// ---------------------------------------------------------------------------

fn find_path_item<'a>(paths: &'a Map<String, Value>, endpoint: &str) -> Option<&'a Value> {
    if let Some(item) = paths.get(endpoint) {
        return Some(item);
    }

    let normalized = normalize_template(endpoint);
    if let Some((_, item)) = paths
        .iter()
        .find(|(key, _)| normalize_template(key) == normalized)
    {
        return Some(item);
    }

    paths
        .iter()
        .filter_map(|(key, item)| literal_score(key, endpoint).map(|score| (score, item)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, item)| item)
}

fn is_template_segment(segment: &str) -> bool {
    segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Replace every `{param}` segment with `{id}`.
fn normalize_template(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_template_segment(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// If `template` matches `concrete`, the number of literal segments it matched on.
fn literal_score(template: &str, concrete: &str) -> Option<usize> {
    let template: Vec<&str> = template.split('/').collect();
    let concrete: Vec<&str> = concrete.split('/').collect();
    if template.len() != concrete.len() {
        return None;
    }
    let mut literals = 0;
    for (t, c) in template.iter().zip(&concrete) {
        if is_template_segment(t) {
            if c.is_empty() {
                return None;
            }
        } else if t == c {
            literals += 1;
        } else {
            return None;
        }
    }
    Some(literals)
}

// ---------------------------------------------------------------------------
// Responses and media types
// ---------------------------------------------------------------------------

fn find_response(operation: &Value, status: u16) -> Option<&Value> {
    let responses = operation.get("responses")?.as_object()?;
    let exact = status.to_string();
    let range = format!("{}XX", status / 100);
    responses
        .get(&exact)
        .or_else(|| responses.get(&range))
        .or_else(|| responses.get(&range.to_ascii_lowercase()))
        .or_else(|| responses.get("default"))
}

fn follow_response_refs<'a>(response: &'a Value, spec: &'a Value) -> Result<&'a Value, OpenApiError> {
    let mut current = response;
    for _ in 0..MAX_RESPONSE_REF_HOPS {
        match current.get("$ref").and_then(Value::as_str) {
            Some(reference) => current = resolve_openapi_ref(reference, spec)?,
            None => return Ok(current),
        }
    }
    let last = current
        .get("$ref")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Err(OpenApiError::RefChainTooDeep(last))
}

fn response_schema(response: &Value) -> Option<&Value> {
    let Some(content) = response.get("content").and_then(Value::as_object) else {
        // Swagger 2.0 puts the schema on the response itself.
        return response.get("schema");
    };
    content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(media, _)| media.starts_with("application/json"))
                .map(|(_, v)| v)
        })
        .or_else(|| {
            content
                .iter()
                .find(|(media, _)| media.ends_with("+json"))
                .map(|(_, v)| v)
        })?
        .get("schema")
}

// ---------------------------------------------------------------------------
// Dereferencing
// ---------------------------------------------------------------------------

/// Inlines internal `$ref`s against one document.
///
/// `stack` holds the references currently being expanded. Finished
/// expansions are memoized by reference, except those that cut a cycle,
/// since what they cut depends on the stack at the time.
struct Dereferencer<'a> {
    spec: &'a Value,
    stack: Vec<String>,
    memo: HashMap<String, (Value, usize)>,
    nodes: usize,
    cycle_cuts: usize,
}

impl<'a> Dereferencer<'a> {
    fn new(spec: &'a Value) -> Self {
        Self {
            spec,
            stack: Vec::new(),
            memo: HashMap::new(),
            nodes: 0,
            cycle_cuts: 0,
        }
    }

    /// Charge `count` emitted values against the budget.
    fn charge(&mut self, count: usize) -> Result<(), OpenApiError> {
        self.nodes = self.nodes.saturating_add(count);
        if self.nodes > MAX_DEREFERENCED_NODES {
            return Err(OpenApiError::SchemaTooLarge {
                limit: MAX_DEREFERENCED_NODES,
            });
        }
        Ok(())
    }

    /// Inline every internal `$ref` below `schema`. Sibling keys of a
    /// `$ref` are dropped, as OpenAPI 3.0 specifies.
    fn inline(&mut self, schema: &Value) -> Result<Value, OpenApiError> {
        let map = match schema {
            Value::Object(map) => map,
            Value::Array(items) => {
                self.charge(1)?;
                return items
                    .iter()
                    .map(|item| self.inline(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array);
            }
            other => {
                self.charge(1)?;
                return Ok(other.clone());
            }
        };

        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            return self.inline_ref(reference);
        }

        self.charge(1)?;
        let mut out = Map::with_capacity(map.len());
        for (key, value) in map {
            out.insert(key.clone(), self.inline(value)?);
        }
        normalize_nullable(&mut out);
        Ok(Value::Object(out))
    }

    fn inline_ref(&mut self, reference: &str) -> Result<Value, OpenApiError> {
        if self.stack.iter().any(|active| active == reference) {
            tracing::debug!(reference, "recursive $ref replaced by permissive schema");
            self.cycle_cuts += 1;
            self.charge(1)?;
            return Ok(json!({}));
        }

        if let Some(size) = self.memo.get(reference).map(|(_, size)| *size) {
            self.charge(size)?;
            if let Some((cached, _)) = self.memo.get(reference) {
                return Ok(cached.clone());
            }
        }

        let target = resolve_openapi_ref(reference, self.spec)?;
        let (nodes_before, cuts_before) = (self.nodes, self.cycle_cuts);
        self.stack.push(reference.to_string());
        let inlined = self.inline(target);
        self.stack.pop();
        let inlined = inlined?;

        if self.cycle_cuts == cuts_before {
            self.memo.insert(
                reference.to_string(),
                (inlined.clone(), self.nodes - nodes_before),
            );
        }
        Ok(inlined)
    }
}

/// Rewrite OpenAPI 3.0 `nullable: true` into a JSON Schema type union.
fn normalize_nullable(schema: &mut Map<String, Value>) {
    if schema.get("nullable") != Some(&Value::Bool(true)) {
        return;
    }
    let rewritten = match schema.get("type") {
        Some(Value::String(ty)) => json!([ty, "null"]),
        Some(Value::Array(types)) => {
            let mut types = types.clone();
            if !types.iter().any(|t| t == "null") {
                types.push(json!("null"));
            }
            Value::Array(types)
        }
        _ => return,
    };
    schema.insert("type".to_string(), rewritten);
    schema.remove("nullable");
}

fn unescape_segment(raw: &str) -> String {
    percent_decode(raw).replace("~1", "/").replace("~0", "~")
}

fn percent_decode(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
