//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{RouterBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    ingress_topic: String,
    route_count: usize,
    forward_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    ingress_topic: blueprint.ingress_topic.clone(),
                    route_count: blueprint.routes.len(),
                    forward_count: blueprint.forward_targets().len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &RouterBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    for route in &blueprint.routes {
        if route.sink.max_concurrency > 1 {
            warnings.push(format!(
                "Route '{}' has max_concurrency {} - its records may be processed out of order",
                route.topic, route.sink.max_concurrency
            ));
        }
        if route.sink.sink_type == SinkType::File && !route.sink.params.contains_key("path") {
            warnings.push(format!(
                "File sink '{}' has no path - writing to ./output/{}.jsonl",
                route.sink.name, route.sink.name
            ));
        }
    }

    if blueprint.broker.consumers_per_topic > 1 {
        warnings.push(format!(
            "broker.consumers_per_topic is {} - submission order within a topic is not guaranteed",
            blueprint.broker.consumers_per_topic
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Ingress topic: {}", summary.ingress_topic);
            println!("  Routes: {}", summary.route_count);
            println!("  Forwards: {}", summary.forward_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RouteConfig, SinkConfig};
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_warnings_for_unordered_routes() {
        let mut blueprint = RouterBlueprint::default();
        blueprint.routes[1].sink.max_concurrency = 4;
        blueprint.broker.consumers_per_topic = 2;
        blueprint.routes.push(RouteConfig::new(
            "AUDIT",
            SinkConfig::new("AUDIT", SinkType::File),
        ));

        let warnings = collect_warnings(&blueprint);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("out of order"));
        assert!(warnings[1].contains("./output/AUDIT.jsonl"));
    }

    #[test]
    fn test_default_blueprint_has_no_warnings() {
        assert!(collect_warnings(&RouterBlueprint::default()).is_empty());
    }

    #[test]
    fn test_validate_missing_file() {
        let args = ValidateArgs {
            config: "/no/such/router.toml".into(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_validate_toml_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
version = "V1"
ingress_topic = "EVEN"

[[routes]]
topic = "EVEN"
[routes.sink]
name = "EVEN"
sink_type = "log"
"#
        )
        .unwrap();

        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(result.valid, "{:?}", result.error);
        assert_eq!(result.summary.unwrap().route_count, 1);
    }
}
