//! `validate` command implementation.

use serde::Serialize;
use tracing::info;

use contracts::{ExperimentBlueprint, SinkType, SourceKind};

use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    experiment: String,
    tag_pair: [String; 2],
    alignment_mode: String,
    source: String,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result).map_err(|e| CliError::Other(e.into()))?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    match result.error {
        None => Ok(()),
        Some(_) if !args.config.exists() => Err(CliError::config_not_found(
            args.config.display().to_string(),
        )),
        Some(message) => Err(CliError::config_validation(message)),
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(format!("File not found: {config_path}")),
            config_path,
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                experiment: blueprint.label(),
                tag_pair: [
                    blueprint.differencer.tag_pair.first().to_string(),
                    blueprint.differencer.tag_pair.second().to_string(),
                ],
                alignment_mode: format!("{:?}", blueprint.differencer.alignment_mode),
                source: format!("{:?}", blueprint.source.kind),
                sink_count: blueprint.sinks.len(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ExperimentBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - batches are only summarized".to_string());
    }

    if !blueprint.sinks.is_empty()
        && blueprint.sinks.iter().all(|s| s.sink_type == SinkType::Memory)
    {
        warnings.push("Only memory sinks configured - nothing is persisted".to_string());
    }

    let differencer = &blueprint.differencer;
    if differencer.window_stride_s > differencer.window_duration_s {
        warnings.push(format!(
            "window_stride_s ({}) exceeds window_duration_s ({}) - some reads fall in no window",
            differencer.window_stride_s, differencer.window_duration_s
        ));
    }

    if blueprint.source.kind == SourceKind::Mock
        && blueprint.source.mock.max_events.is_none()
        && !blueprint.source.mock.realtime
    {
        warnings.push(
            "Mock source is unbounded and not paced - run until cancelled".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Experiment: {}", summary.experiment);
            println!("  Tag pair: {} / {}", summary.tag_pair[0], summary.tag_pair[1]);
            println!("  Alignment: {}", summary.alignment_mode);
            println!("  Source: {}", summary.source);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
