//! # respval-cli: Response Validation from the Command Line
//!
//! Provides the `respval` binary over files on disk.
//!
//! ## Subcommands
//!
//! - `respval validate`: Validate a response body against a JSON Schema or
//!   OpenAPI document, optionally with a shape assertion.
//! - `respval extract`: Print the dereferenced response schema an OpenAPI
//!   document declares for one endpoint, method and status.
//!
//! ```bash
//! respval validate --data body.json --schema api.yaml --path /users/{id} --method get
//! respval extract --spec api.yaml --path /users/42 --method get --status 404
//! ```
//!
//! Exit codes: 0 on success, 1 on validation failure, 2 on operational error.

pub mod extract;
pub mod validate;

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use respval_core::ValidatorConfig;
use respval_schema::yaml_to_json_value;
use serde_json::Value;

/// Exit code for a run that found no problems.
pub const EXIT_OK: u8 = 0;

/// Exit code for a run whose data failed validation.
pub const EXIT_INVALID: u8 = 1;

/// Exit code for an operational error (unreadable file, bad arguments).
pub const EXIT_ERROR: u8 = 2;

/// Load the validator configuration from `path`, or from the environment.
pub fn load_config(path: Option<&Path>) -> Result<ValidatorConfig> {
    let config = match path {
        Some(path) => ValidatorConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ValidatorConfig::from_env().context("invalid RESPVAL_* environment variable")?,
    };
    tracing::debug!(?config, "resolved validator configuration");
    Ok(config)
}

/// Read a JSON or YAML document. The format follows the extension;
/// `-` reads JSON from standard input. YAML scalar keys such as `200:`
/// become strings.
pub fn read_document(path: &Path) -> Result<Value> {
    if path == Path::new("-") {
        return serde_json::from_reader(std::io::stdin().lock())
            .context("failed to parse JSON from standard input");
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("yaml" | "yml") => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse YAML {}", path.display()))?;
            yaml_to_json_value(&yaml)
                .map_err(|reason| anyhow!("failed to convert YAML {}: {reason}", path.display()))
        }
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON {}", path.display())),
        _ => bail!(
            "unsupported file extension for {}: expected .json, .yaml or .yml",
            path.display()
        ),
    }
}
