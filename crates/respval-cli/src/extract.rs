//! # Extract Subcommand
//!
//! Prints the response schema an OpenAPI document declares for one
//! operation, with internal `$ref`s inlined. Unlike validation, a lookup
//! failure here is reported as an error rather than replaced by the
//! fallback schema, unless `--fallback` is given.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use respval_core::ValidatorConfig;
use respval_schema::openapi::{is_openapi_document, try_extract_openapi_schema, DEFAULT_STATUS};
use respval_schema::{extract_openapi_schema, load_schema_file};

use crate::EXIT_OK;

/// Arguments for the `respval extract` subcommand.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// OpenAPI or Swagger document (.json/.yaml/.yml).
    #[arg(long, value_name = "FILE")]
    pub spec: PathBuf,

    /// Path template or concrete path.
    #[arg(long, visible_alias = "endpoint")]
    pub path: String,

    /// Operation method.
    #[arg(long)]
    pub method: String,

    /// Response status.
    #[arg(long, default_value_t = DEFAULT_STATUS)]
    pub status: u16,

    /// Print the generic fallback schema instead of failing when the
    /// response cannot be located.
    #[arg(long)]
    pub fallback: bool,
}

/// Execute the extract subcommand.
pub fn run_extract(args: &ExtractArgs, config: &ValidatorConfig) -> Result<u8> {
    let spec = load_schema_file(&args.spec, config.schema_root.as_deref())?;
    if !is_openapi_document(&spec) {
        bail!(
            "{} is not an OpenAPI document (no top-level openapi or swagger key)",
            args.spec.display()
        );
    }

    let schema = if args.fallback {
        extract_openapi_schema(
            &spec,
            Some(args.path.as_str()),
            Some(args.method.as_str()),
            args.status,
        )
    } else {
        try_extract_openapi_schema(&spec, &args.path, &args.method, args.status).with_context(
            || {
                format!(
                    "cannot extract {} {} {} from {}",
                    args.method,
                    args.path,
                    args.status,
                    args.spec.display()
                )
            },
        )?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&schema).context("failed to serialize schema")?
    );
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r##"
openapi: 3.0.0
paths:
  /pets/{petId}:
    get:
      responses:
        "200":
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Pet"
components:
  schemas:
    Pet:
      type: object
      required: [name]
"##;

    fn args(dir: &tempfile::TempDir, path: &str) -> ExtractArgs {
        let spec = dir.path().join("pets.yaml");
        std::fs::write(&spec, SPEC).unwrap();
        ExtractArgs {
            spec,
            path: path.to_string(),
            method: "get".to_string(),
            status: 200,
            fallback: false,
        }
    }

    #[test]
    fn extracts_known_operation() {
        let dir = tempfile::tempdir().unwrap();
        let code = run_extract(&args(&dir, "/pets/7"), &ValidatorConfig::default()).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn unknown_operation_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_extract(&args(&dir, "/owners"), &ValidatorConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("endpoint not found: /owners"));
    }

    #[test]
    fn fallback_flag_prints_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(&dir, "/owners");
        args.fallback = true;
        assert_eq!(run_extract(&args, &ValidatorConfig::default()).unwrap(), 0);
    }

    #[test]
    fn non_openapi_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(&dir, "/pets/7");
        args.spec = dir.path().join("plain.json");
        std::fs::write(&args.spec, r#"{"type": "object"}"#).unwrap();
        let err = run_extract(&args, &ValidatorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("is not an OpenAPI document"));
    }
}
