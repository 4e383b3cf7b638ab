//! # Validate Subcommand
//!
//! Validates a response body file against a schema file. The schema file may
//! hold a JSON Schema or an OpenAPI/Swagger document; for the latter,
//! `--path`/`--endpoint`, `--method` and `--status` select the response.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use respval_core::ValidatorConfig;
use respval_schema::{ResponseValidator, ShapeAssertion, SupportedSchema, ValidateOptions};

use crate::{read_document, EXIT_INVALID, EXIT_OK};

/// Arguments for the `respval validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Response body to validate (.json/.yaml/.yml, or `-` for JSON on stdin).
    #[arg(long, value_name = "FILE")]
    pub data: PathBuf,

    /// Schema or OpenAPI document (.json/.yaml/.yml).
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,

    /// OpenAPI path, template or concrete. Preferred over --endpoint.
    #[arg(long)]
    pub path: Option<String>,

    /// Alias for --path.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// OpenAPI operation method.
    #[arg(long)]
    pub method: Option<String>,

    /// OpenAPI response status [default: 200].
    #[arg(long)]
    pub status: Option<u16>,

    /// JSON/YAML shape assertion: objects nest, other values must match exactly.
    #[arg(long, value_name = "FILE")]
    pub shape: Option<PathBuf>,

    /// Print the full result as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 on success, 1 on validation failure.
pub fn run_validate(args: &ValidateArgs, config: ValidatorConfig) -> Result<u8> {
    let data = read_document(&args.data)?;
    let options = build_options(args)?;
    let validator = ResponseValidator::new(config);
    let schema = SupportedSchema::file(&args.schema);

    let result = validator.validate_schema(&data, &schema, &options);
    tracing::info!(
        success = result.success,
        errors = result.errors.len(),
        format = %result.schema_format,
        "validated {}",
        args.data.display()
    );

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("failed to serialize result")?
        );
    } else {
        println!("{result}");
    }

    Ok(if result.success { EXIT_OK } else { EXIT_INVALID })
}

fn build_options(args: &ValidateArgs) -> Result<ValidateOptions> {
    let mut options = ValidateOptions {
        path: args.path.clone(),
        endpoint: args.endpoint.clone(),
        method: args.method.clone(),
        status: args.status,
        ..ValidateOptions::default()
    };
    if let Some(shape_path) = &args.shape {
        options.shape = Some(load_shape(shape_path)?);
    }
    Ok(options)
}

fn load_shape(path: &Path) -> Result<ShapeAssertion> {
    let document = read_document(path)?;
    ShapeAssertion::from_value(&document).with_context(|| {
        format!(
            "shape assertion {} must be a JSON/YAML object",
            path.display()
        )
    })
}
