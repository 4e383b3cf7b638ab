//! # respval CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use respval_cli::extract::{run_extract, ExtractArgs};
use respval_cli::validate::{run_validate, ValidateArgs};
use respval_cli::{load_config, EXIT_ERROR};

/// Validate HTTP response bodies against JSON Schema and OpenAPI documents.
#[derive(Parser, Debug)]
#[command(name = "respval", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a YAML/JSON validator configuration file. Without it,
    /// RESPVAL_* environment variables are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a response body against a schema or OpenAPI document.
    Validate(ValidateArgs),

    /// Print the dereferenced response schema for one OpenAPI operation.
    Extract(ExtractArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!("respval CLI starting");

    let result = load_config(cli.config.as_deref()).and_then(|config| match &cli.command {
        Commands::Validate(args) => run_validate(args, config),
        Commands::Extract(args) => run_extract(args, &config),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_validate_with_openapi_target() {
        let cli = Cli::try_parse_from([
            "respval", "-vv", "validate", "--data", "body.json", "--schema", "api.yaml",
            "--path", "/users/{id}", "--method", "get", "--status", "404", "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.data, PathBuf::from("body.json"));
                assert_eq!(args.path.as_deref(), Some("/users/{id}"));
                assert_eq!(args.status, Some(404));
                assert!(args.json);
                assert!(args.shape.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn validate_requires_data_and_schema() {
        assert!(Cli::try_parse_from(["respval", "validate", "--data", "a.json"]).is_err());
        assert!(Cli::try_parse_from(["respval", "validate", "--schema", "a.json"]).is_err());
    }

    #[test]
    fn parses_extract_with_default_status() {
        let cli = Cli::try_parse_from([
            "respval", "extract", "--spec", "api.json", "--endpoint", "/pets", "--method", "post",
            "--config", "respval.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("respval.yaml")));
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.path, "/pets");
                assert_eq!(args.status, 200);
                assert!(!args.fallback);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_status() {
        assert!(Cli::try_parse_from([
            "respval", "extract", "--spec", "a.json", "--path", "/", "--method", "get",
            "--status", "70000",
        ])
        .is_err());
    }
}
