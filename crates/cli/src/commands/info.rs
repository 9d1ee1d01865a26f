//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::RouterBlueprint;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    ingress_topic: String,
    broker: BrokerInfo,
    excerpt_chars: usize,
    routes: Vec<RouteInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    forwards: Vec<ForwardInfo>,
}

#[derive(Serialize)]
struct BrokerInfo {
    topic_capacity: usize,
    consumers_per_topic: usize,
}

#[derive(Serialize)]
struct RouteInfo {
    topic: String,
    sink: String,
    sink_type: String,
    queue_capacity: usize,
    max_concurrency: usize,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

#[derive(Serialize)]
struct ForwardInfo {
    from: String,
    to: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = ?args.config, "Loading configuration info");

    let blueprint = load_blueprint(args.config.as_deref())?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &RouterBlueprint) -> ConfigInfo {
    let routes = blueprint
        .routes
        .iter()
        .map(|r| RouteInfo {
            topic: r.topic.clone(),
            sink: r.sink.name.clone(),
            sink_type: format!("{:?}", r.sink.sink_type),
            queue_capacity: r.sink.queue_capacity,
            max_concurrency: r.sink.max_concurrency,
            params: r.sink.params.clone(),
        })
        .collect();

    let forwards = blueprint
        .forward_targets()
        .into_iter()
        .map(|(route, target)| ForwardInfo {
            from: route.topic.clone(),
            to: target,
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        ingress_topic: blueprint.ingress_topic.clone(),
        broker: BrokerInfo {
            topic_capacity: blueprint.broker.topic_capacity,
            consumers_per_topic: blueprint.broker.consumers_per_topic,
        },
        excerpt_chars: blueprint.reporting.excerpt_chars,
        routes,
        forwards,
    }
}

fn print_config_info(blueprint: &RouterBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Topic Router Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📥 Ingress");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Topic: {}", blueprint.ingress_topic);
    println!(
        "   ├─ Queue capacity: {} per topic",
        blueprint.broker.topic_capacity
    );
    println!(
        "   └─ Consumers: {} per topic",
        blueprint.broker.consumers_per_topic
    );

    println!("\n🔀 Routes ({})", blueprint.routes.len());
    for (i, route) in blueprint.routes.iter().enumerate() {
        let is_last = i == blueprint.routes.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} → {} ({:?})",
            prefix, route.topic, route.sink.name, route.sink.sink_type
        );
        println!(
            "   {}  └─ queue {}, concurrency {}",
            child_prefix, route.sink.queue_capacity, route.sink.max_concurrency
        );
    }

    let forwards = blueprint.forward_targets();
    if !forwards.is_empty() {
        println!("\n📤 Forwards ({})", forwards.len());
        for (i, (route, target)) in forwards.iter().enumerate() {
            let prefix = if i == forwards.len() - 1 { "└─" } else { "├─" };
            println!("   {} {} → {}", prefix, route.topic, target);
        }
    }

    println!(
        "\n⚠️  Failure excerpts: {} chars",
        blueprint.reporting.excerpt_chars
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_info_for_default_layout() {
        let info = build_config_info(&RouterBlueprint::default());

        assert_eq!(info.ingress_topic, "SOURCE");
        assert_eq!(info.routes.len(), 3);
        assert_eq!(info.routes[0].sink_type, "AgeParity");
        let targets: Vec<&str> = info.forwards.iter().map(|f| f.to.as_str()).collect();
        assert_eq!(targets, vec!["EVEN", "ODD"]);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["broker"]["topic_capacity"], 1024);
    }

    #[test]
    fn test_run_info_default() {
        let args = InfoArgs {
            config: None,
            json: true,
        };
        assert!(run_info(&args).is_ok());
    }
}
