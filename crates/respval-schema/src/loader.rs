//! # Schema File Loading
//!
//! Reads a JSON or YAML schema document from disk.
//!
//! ## Security policy
//!
//! Only `.json`, `.yaml` and `.yml` files are accepted. The extension is
//! checked before the file system is touched, so a disallowed path never
//! results in a read. YAML is parsed with `serde_yaml`, which has no tag
//! hooks that could construct arbitrary objects or run code.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Extensions a schema file may carry (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Errors raised while loading a schema file.
#[derive(Error, Debug)]
pub enum SchemaFileError {
    /// The file extension is not on the allow-list.
    #[error("invalid file extension for {path}: only .json, .yaml and .yml are allowed")]
    InvalidExtension {
        /// The rejected path, as given.
        path: String,
    },

    /// The resolved path does not exist or is not a file.
    #[error("schema file not found: {path}")]
    NotFound {
        /// The resolved absolute path.
        path: String,
    },

    /// The file exists but could not be read.
    #[error("cannot read {path}: {reason}")]
    Read {
        /// The resolved absolute path.
        path: String,
        /// Underlying I/O error.
        reason: String,
    },

    /// The file content is not valid JSON/YAML.
    #[error("invalid {format} in {path}: {reason}")]
    Parse {
        /// `JSON` or `YAML`.
        format: &'static str,
        /// The resolved absolute path.
        path: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Returns true if `path` names a YAML file.
pub fn is_yaml_path(path: &Path) -> bool {
    matches!(extension_of(path).as_deref(), Some("yaml" | "yml"))
}

/// Load and parse a schema file.
///
/// Relative paths are resolved against `root`, or against the process
/// working directory when `root` is `None`.
///
/// # Errors
///
/// - [`SchemaFileError::InvalidExtension`] before any file-system access if
///   the extension is not allowed.
/// - [`SchemaFileError::NotFound`] if the resolved path is not a file.
/// - [`SchemaFileError::Read`] / [`SchemaFileError::Parse`] for I/O and
///   syntax failures.
pub fn load_schema_file(path: &Path, root: Option<&Path>) -> Result<Value, SchemaFileError> {
    let ext = extension_of(path);
    if !ext
        .as_deref()
        .is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e))
    {
        return Err(SchemaFileError::InvalidExtension {
            path: path.display().to_string(),
        });
    }

    let resolved = resolve_path(path, root)?;
    if !resolved.is_file() {
        return Err(SchemaFileError::NotFound {
            path: resolved.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(&resolved).map_err(|e| SchemaFileError::Read {
        path: resolved.display().to_string(),
        reason: e.to_string(),
    })?;

    tracing::debug!(path = %resolved.display(), bytes = content.len(), "loaded schema file");

    if is_yaml_path(&resolved) {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| SchemaFileError::Parse {
                format: "YAML",
                path: resolved.display().to_string(),
                reason: e.to_string(),
            })?;
        yaml_to_json_value(&yaml).map_err(|reason| SchemaFileError::Parse {
            format: "YAML",
            path: resolved.display().to_string(),
            reason,
        })
    } else {
        serde_json::from_str(&content).map_err(|e| SchemaFileError::Parse {
            format: "JSON",
            path: resolved.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

fn resolve_path(path: &Path, root: Option<&Path>) -> Result<PathBuf, SchemaFileError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    match root {
        Some(root) if root.is_absolute() => Ok(root.join(path)),
        _ => {
            let cwd = std::env::current_dir().map_err(|e| SchemaFileError::Read {
                path: path.display().to_string(),
                reason: format!("cannot determine working directory: {e}"),
            })?;
            Ok(match root {
                Some(root) => cwd.join(root).join(path),
                None => cwd.join(path),
            })
        }
    }
}

/// Convert a `serde_yaml::Value` tree into the equivalent JSON tree.
///
/// Scalar map keys are stringified (OpenAPI status codes are commonly written
/// as bare integers, e.g. `200:`). Tags are dropped in favour of their inner
/// value. Non-scalar keys and non-finite floats have no JSON form and are
/// rejected.
///
/// # Errors
///
/// Returns a description of the first node with no JSON form.
pub fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("number {n} has no JSON representation"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => "null".to_string(),
                    _ => return Err("mapping keys must be scalars".to_string()),
                };
                object.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(object))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}
