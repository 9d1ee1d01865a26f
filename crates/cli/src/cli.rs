//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Topic Router - route topic-tagged JSON records to per-topic sinks
#[derive(Parser, Debug)]
#[command(
    name = "topic-router",
    author,
    version,
    about = "Topic routing dispatcher",
    long_about = "Routes topic-tagged JSON records to the sink registered for their topic.\n\n\
                  Publishes messages to an in-process broker, consumes every routed topic, \n\
                  and reports each record as delivered or failed."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        env = "TOPIC_ROUTER_VERBOSE"
    )]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TOPIC_ROUTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish messages and route them until drained
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the routing table
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in SOURCE/EVEN/ODD layout if omitted
    #[arg(short, long, env = "TOPIC_ROUTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Message payload to publish (repeatable)
    #[arg(short, long = "message")]
    pub messages: Vec<String>,

    /// File with one message per line
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Topic to publish to (defaults to the configured ingress topic)
    #[arg(short, long, env = "TOPIC_ROUTER_TOPIC")]
    pub topic: Option<String>,

    /// Seconds to wait for routing to drain (0 = no timeout)
    ///
    /// When it expires, queued records are abandoned and sinks get the same
    /// time again to flush.
    #[arg(long, default_value = "30", env = "TOPIC_ROUTER_TIMEOUT")]
    pub timeout: u64,

    /// Retries for a publish rejected because the topic queue is full
    #[arg(long, default_value = "50", env = "TOPIC_ROUTER_SEND_RETRIES")]
    pub send_retries: u32,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TOPIC_ROUTER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without routing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "router.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in layout if omitted
    #[arg(short, long, env = "TOPIC_ROUTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
