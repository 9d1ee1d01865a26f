//! Record routing metrics
//!
//! Prometheus recording helpers plus an in-memory aggregator for run summaries.

use std::collections::{BTreeMap, HashMap};

use contracts::{FailureEvent, FailureKind, Outcome};
use metrics::{counter, gauge, histogram};

/// Record a record pulled from a topic
pub fn record_record_received(topic: &str) {
    counter!(
        "topic_router_records_received_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// Record the terminal outcome of one record
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_outcome;
///
/// let outcome = dispatcher.submit(record).await;
/// record_outcome("SOURCE", &outcome);
/// ```
pub fn record_outcome(topic: &str, outcome: &Outcome) {
    counter!(
        "topic_router_outcomes_total",
        "topic" => topic.to_string(),
        "outcome" => outcome.label()
    )
    .increment(1);

    if let Some(sink) = outcome.sink() {
        counter!(
            "topic_router_records_delivered_total",
            "sink" => sink.to_string()
        )
        .increment(1);
    }
}

/// Record how long a sink took for one record
pub fn record_sink_latency_ms(sink: &str, latency_ms: f64) {
    histogram!(
        "topic_router_sink_latency_ms",
        "sink" => sink.to_string()
    )
    .record(latency_ms);
}

/// Record a sink's current queue depth
pub fn record_queue_depth(sink: &str, depth: usize) {
    gauge!(
        "topic_router_sink_queue_depth",
        "sink" => sink.to_string()
    )
    .set(depth as f64);
}

/// Record a publish attempt on the production side
pub fn record_send(topic: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "topic_router_messages_sent_total",
        "topic" => topic.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a failure event handed to the error reporter
pub fn record_failure_event(event: &FailureEvent) {
    counter!(
        "topic_router_failure_events_total",
        "topic" => event.topic.clone(),
        "kind" => event.reason.kind().as_str()
    )
    .increment(1);
}

/// Outcome aggregator
///
/// Aggregates outcomes in memory for summaries.
#[derive(Debug, Clone, Default)]
pub struct OutcomeAggregator {
    /// Records seen
    pub total: u64,

    /// Records delivered
    pub delivered: u64,

    /// Failures per kind
    pub failures: HashMap<FailureKind, u64>,

    /// (delivered, failed) per topic
    pub per_topic: BTreeMap<String, (u64, u64)>,

    /// Submit latency (ms)
    pub latency_stats: RunningStats,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one outcome into the aggregate
    pub fn update(&mut self, topic: &str, outcome: &Outcome, latency_ms: f64) {
        self.total += 1;
        let entry = self.per_topic.entry(topic.to_string()).or_default();

        match outcome {
            Outcome::Delivered(_) => {
                self.delivered += 1;
                entry.0 += 1;
            }
            Outcome::Failed(reason) => {
                *self.failures.entry(reason.kind()).or_insert(0) += 1;
                entry.1 += 1;
            }
        }

        self.latency_stats.push(latency_ms);
    }

    /// Failure count for one kind
    pub fn failures_of(&self, kind: FailureKind) -> u64 {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    /// Build a summary report
    pub fn summary(&self) -> OutcomeSummary {
        let failed = self.total - self.delivered;
        OutcomeSummary {
            total: self.total,
            delivered: self.delivered,
            unknown_topic: self.failures_of(FailureKind::UnknownTopic),
            parse_errors: self.failures_of(FailureKind::ParseError),
            sink_errors: self.failures_of(FailureKind::SinkError),
            failure_rate: if self.total > 0 {
                failed as f64 / self.total as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
            per_topic: self.per_topic.clone(),
        }
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Outcome summary
#[derive(Debug, Clone, Default)]
pub struct OutcomeSummary {
    pub total: u64,
    pub delivered: u64,
    pub unknown_topic: u64,
    pub parse_errors: u64,
    pub sink_errors: u64,
    pub failure_rate: f64,
    pub latency_ms: StatsSummary,
    pub per_topic: BTreeMap<String, (u64, u64)>,
}

impl std::fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Routing Summary ===")?;
        writeln!(f, "Total records: {}", self.total)?;
        writeln!(f, "Delivered: {}", self.delivered)?;
        writeln!(
            f,
            "Failed: {} ({:.2}%)",
            self.total - self.delivered,
            self.failure_rate
        )?;
        writeln!(f, "  unknown topic: {}", self.unknown_topic)?;
        writeln!(f, "  parse error: {}", self.parse_errors)?;
        writeln!(f, "  sink error: {}", self.sink_errors)?;
        writeln!(f, "Submit latency (ms): {}", self.latency_ms)?;

        if !self.per_topic.is_empty() {
            writeln!(f, "Per topic (delivered/failed):")?;
            for (topic, (delivered, failed)) in &self.per_topic {
                writeln!(f, "  {}: {}/{}", topic, delivered, failed)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
