//! `run` command implementation.

use std::io::{IsTerminal, Read};
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::RouterBlueprint;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args.config.as_deref())?;
    let topic = args
        .topic
        .clone()
        .unwrap_or_else(|| blueprint.ingress_topic.clone());

    info!(
        ingress = %blueprint.ingress_topic,
        publish_topic = %topic,
        routes = blueprint.routes.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint, &topic);
        return Ok(());
    }

    let messages = collect_messages(args)?;

    // Build pipeline configuration
    let pipeline_config = PipelineConfig {
        blueprint,
        topic,
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        send_retries: args.send_retries,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let pipeline = Pipeline::new(pipeline_config);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        result = pipeline.run(messages) => {
            let stats = result.context("Pipeline execution failed")?;
            info!(
                published = stats.published,
                delivered = stats.outcomes.delivered,
                failed = stats.outcomes.total - stats.outcomes.delivered,
                duration_secs = stats.duration.as_secs_f64(),
                "Pipeline completed"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("Topic Router finished");
    Ok(())
}

/// Gather payloads from `-m`, `--input` and, when neither is given, stdin
///
/// Blank lines in files and on stdin are skipped.
fn collect_messages(args: &RunArgs) -> Result<Vec<String>, CliError> {
    let mut messages = args.messages.clone();

    if let Some(path) = &args.input {
        if !path.exists() {
            return Err(CliError::input_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        messages.extend(non_blank_lines(&content));
    } else if messages.is_empty() && !std::io::stdin().is_terminal() {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        messages.extend(non_blank_lines(&content));
    }

    if messages.is_empty() {
        return Err(CliError::NoMessages);
    }
    Ok(messages)
}

fn non_blank_lines(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RouterBlueprint, topic: &str) {
    println!("\n=== Configuration Summary ===\n");
    println!("Ingress topic: {}", blueprint.ingress_topic);
    println!("Publish topic: {}", topic);
    println!(
        "Broker: capacity {} per topic, {} consumer(s) per topic",
        blueprint.broker.topic_capacity, blueprint.broker.consumers_per_topic
    );

    println!("\nRoutes ({}):", blueprint.routes.len());
    for route in &blueprint.routes {
        println!(
            "  - {} -> {} ({:?}, queue {}, concurrency {})",
            route.topic,
            route.sink.name,
            route.sink.sink_type,
            route.sink.queue_capacity,
            route.sink.max_concurrency
        );
    }

    let forwards = blueprint.forward_targets();
    if !forwards.is_empty() {
        println!("\nForwards:");
        for (route, target) in forwards {
            println!("  - {} -> {}", route.topic, target);
        }
    }

    println!();
}
