//! Pipeline statistics.

use std::time::Duration;

use contracts::FailureEvent;
use dispatcher::MetricsSnapshot;
use observability::OutcomeSummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Messages accepted by the broker
    pub published: u64,

    /// Messages the broker refused
    pub rejected: u64,

    /// Routes in the table
    pub routes: usize,

    /// Whether draining hit the timeout
    pub timed_out: bool,

    /// Messages left uncommitted after a timed out drain
    pub abandoned: usize,

    /// Total duration of the run
    pub duration: Duration,

    /// Outcomes of every consumed record, forwards included
    pub outcomes: OutcomeSummary,

    /// Per-sink counters at shutdown
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,

    /// Every reported failure
    pub failures: Vec<FailureEvent>,
}

impl PipelineStats {
    /// Records routed per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.outcomes.total as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Routing Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Published: {}", self.published);
        println!("   ├─ Rejected: {}", self.rejected);
        println!("   ├─ Records/s: {:.2}", self.throughput());
        println!("   ├─ Routes: {}", self.routes);
        if self.timed_out {
            println!("   └─ Drained: no (timed out, {} abandoned)", self.abandoned);
        } else {
            println!("   └─ Drained: yes");
        }

        println!("\n{}", self.outcomes);

        if !self.sink_metrics.is_empty() {
            println!("📤 Sinks (delivered/failed/panicked)");
            for (i, (name, metrics)) in self.sink_metrics.iter().enumerate() {
                let prefix = if i == self.sink_metrics.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: {}/{}/{}",
                    prefix,
                    name,
                    metrics.delivered_count,
                    metrics.failure_count,
                    metrics.panic_count
                );
            }
        }

        if !self.failures.is_empty() {
            println!("\n⚠️  Failures");
            for event in &self.failures {
                println!(
                    "   ├─ #{} [{}] {}: {}",
                    event.sequence, event.topic, event.reason, event.payload_excerpt
                );
            }
        }

        println!();
    }
}
