//! RouterBlueprint - Config Loader output
//!
//! Describes the complete routing setup: ingress topic, broker queues,
//! error reporting and the static topic -> sink table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete routing blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouterBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Topic that inbound messages are published to
    #[serde(default = "default_ingress_topic")]
    #[validate(length(min = 1, message = "ingress topic cannot be empty"))]
    pub ingress_topic: String,

    /// In-memory broker settings
    #[serde(default)]
    #[validate(nested)]
    pub broker: BrokerConfig,

    /// Failure reporting settings
    #[serde(default)]
    #[validate(nested)]
    pub reporting: ReportingConfig,

    /// Static routing table
    #[validate(nested)]
    pub routes: Vec<RouteConfig>,
}

fn default_ingress_topic() -> String {
    "SOURCE".to_string()
}

/// Broker settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrokerConfig {
    /// Capacity of each topic queue
    #[serde(default = "default_topic_capacity")]
    #[validate(range(min = 1, message = "topic_capacity must be >= 1"))]
    pub topic_capacity: usize,

    /// Concurrent consumer tasks per routed topic
    #[serde(default = "default_consumers_per_topic")]
    #[validate(range(min = 1, message = "consumers_per_topic must be >= 1"))]
    pub consumers_per_topic: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            topic_capacity: default_topic_capacity(),
            consumers_per_topic: default_consumers_per_topic(),
        }
    }
}

fn default_topic_capacity() -> usize {
    1024
}

fn default_consumers_per_topic() -> usize {
    1
}

/// Failure reporting settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReportingConfig {
    /// Max payload characters kept in a failure event
    #[serde(default = "default_excerpt_chars")]
    #[validate(range(min = 1, message = "excerpt_chars must be >= 1"))]
    pub excerpt_chars: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_excerpt_chars() -> usize {
    256
}

/// One entry of the routing table
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouteConfig {
    /// Topic label
    #[validate(length(min = 1, message = "topic cannot be empty"))]
    pub topic: String,

    /// Sink receiving the topic's records
    #[validate(nested)]
    pub sink: SinkConfig,
}

impl RouteConfig {
    pub fn new(topic: impl Into<String>, sink: SinkConfig) -> Self {
        Self {
            topic: topic.into(),
            sink,
        }
    }
}

/// Sink output config
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1, message = "sink name cannot be empty"))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, message = "queue_capacity must be >= 1"))]
    pub queue_capacity: usize,

    /// Records processed at once (1 keeps per-topic order)
    #[serde(default = "default_max_concurrency")]
    #[validate(range(
        min = 1,
        max = 1000000,
        message = "max_concurrency must be between 1 and 1000000"
    ))]
    pub max_concurrency: usize,

    /// Type-specific params
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    /// Sink config with default capacity, concurrency and no params
    pub fn new(name: impl Into<String>, sink_type: SinkType) -> Self {
        Self {
            name: name.into(),
            sink_type,
            queue_capacity: default_queue_capacity(),
            max_concurrency: default_max_concurrency(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

fn default_queue_capacity() -> usize {
    100
}

/// Upper bound for `SinkConfig::max_concurrency`
pub const MAX_SINK_CONCURRENCY: usize = 1_000_000;

fn default_max_concurrency() -> usize {
    1
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON lines file output
    File,
    /// Classify by age parity and forward to the even/odd topic
    AgeParity,
}

/// Param keys and defaults understood by `SinkType::AgeParity`
pub mod age_parity_params {
    pub const EVEN_TOPIC: &str = "even_topic";
    pub const ODD_TOPIC: &str = "odd_topic";
    pub const DEFAULT_EVEN_TOPIC: &str = "EVEN";
    pub const DEFAULT_ODD_TOPIC: &str = "ODD";
}

impl RouterBlueprint {
    /// Routed topic labels in table order
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.topic.as_str())
    }

    /// Find the route for a topic
    pub fn route(&self, topic: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|route| route.topic == topic)
    }

    /// Topics an `age_parity` sink forwards to, with the route it belongs to
    pub fn forward_targets(&self) -> Vec<(&RouteConfig, String)> {
        use age_parity_params::*;

        let mut targets = Vec::new();
        for route in &self.routes {
            if route.sink.sink_type != SinkType::AgeParity {
                continue;
            }
            let params = &route.sink.params;
            let even = params.get(EVEN_TOPIC).map(String::as_str);
            let odd = params.get(ODD_TOPIC).map(String::as_str);
            targets.push((route, even.unwrap_or(DEFAULT_EVEN_TOPIC).to_string()));
            targets.push((route, odd.unwrap_or(DEFAULT_ODD_TOPIC).to_string()));
        }
        targets
    }
}

impl Default for RouterBlueprint {
    /// SOURCE -> age parity classifier, EVEN / ODD -> log
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            ingress_topic: default_ingress_topic(),
            broker: BrokerConfig::default(),
            reporting: ReportingConfig::default(),
            routes: vec![
                RouteConfig::new("SOURCE", SinkConfig::new("SOURCE", SinkType::AgeParity)),
                RouteConfig::new("EVEN", SinkConfig::new("EVEN", SinkType::Log)),
                RouteConfig::new("ODD", SinkConfig::new("ODD", SinkType::Log)),
            ],
        }
    }
}
