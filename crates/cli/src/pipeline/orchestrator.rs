//! Pipeline orchestrator - wires broker, dispatcher and consumers together.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use contracts::{Ack, ErrorReporter, Producer, RouterBlueprint, SendError};
use dispatcher::{Dispatcher, FanoutErrorReporter, MemoryErrorReporter, TracingErrorReporter};
use ingestion::{IngestionPipeline, MemoryBroker};
use tracing::{debug, info, warn};

use super::PipelineStats;

/// Pause between publish attempts while the topic queue is full
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Routing configuration
    pub blueprint: RouterBlueprint,

    /// Topic messages are published to
    pub topic: String,

    /// Drain timeout (None = wait until idle)
    pub timeout: Option<Duration>,

    /// Retries for a publish rejected with `Full`
    pub send_retries: u32,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Publish every message, wait for routing to drain, then shut down
    pub async fn run(self, messages: Vec<String>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Setup broker
        let broker = Arc::new(MemoryBroker::from_blueprint(blueprint));
        info!(topics = ?broker.topics(), "Broker ready");

        // Setup dispatcher
        let failures = Arc::new(MemoryErrorReporter::new());
        let reporter: Arc<dyn ErrorReporter> = Arc::new(
            FanoutErrorReporter::new()
                .with(Arc::new(TracingErrorReporter))
                .with(failures.clone()),
        );
        let dispatcher = Arc::new(
            dispatcher::create_dispatcher(blueprint, Arc::clone(&broker), reporter)
                .await
                .context("Failed to create dispatcher")?,
        );

        // Start consumers
        let ingestion = IngestionPipeline::start(
            Arc::clone(&broker),
            Arc::clone(&dispatcher),
            blueprint.broker.consumers_per_topic,
        )
        .context("Failed to start ingestion pipeline")?;

        info!(
            consumers = ingestion.consumer_count(),
            topic = %self.config.topic,
            messages = messages.len(),
            "Publishing messages"
        );

        let mut stats = PipelineStats {
            routes: blueprint.routes.len(),
            ..Default::default()
        };

        for message in messages {
            match publish_with_retry(
                broker.as_ref(),
                &self.config.topic,
                Bytes::from(message),
                self.config.send_retries,
            )
            .await
            {
                Ok(ack) => {
                    debug!(topic = %ack.topic, offset = ack.offset, "Message published");
                    stats.published += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Message rejected");
                    stats.rejected += 1;
                }
            }
        }

        // Wait for every published and forwarded message to be committed
        let drained = match self.config.timeout {
            Some(timeout) => {
                let idle = tokio::time::timeout(timeout, broker.wait_idle()).await;
                if idle.is_err() {
                    warn!(
                        timeout_secs = timeout.as_secs(),
                        pending = broker.pending(),
                        "Drain timed out"
                    );
                }
                idle.is_ok()
            }
            None => {
                broker.wait_idle().await;
                true
            }
        };
        stats.timed_out = !drained;

        // Shutdown
        info!("Shutting down pipeline...");
        broker.close();
        stats.outcomes = if drained {
            ingestion.join().await
        } else {
            ingestion.abort().await
        };
        stats.abandoned = broker.pending();
        stats.sink_metrics = dispatcher.metrics();
        stats.failures = failures.take();

        match Arc::try_unwrap(dispatcher) {
            Ok(dispatcher) => {
                let limit = self.config.timeout.filter(|_| !drained);
                shutdown_dispatcher(dispatcher, limit).await;
            }
            Err(_) => warn!("Dispatcher still in use, sinks not flushed"),
        }

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Flush and close every sink, giving up after `limit` when one is set
async fn shutdown_dispatcher(dispatcher: Dispatcher, limit: Option<Duration>) {
    match limit {
        Some(limit) => {
            if tokio::time::timeout(limit, dispatcher.shutdown())
                .await
                .is_err()
            {
                warn!(
                    limit_secs = limit.as_secs(),
                    "Sinks did not stop in time, output may be incomplete"
                );
            }
        }
        None => dispatcher.shutdown().await,
    }
}

/// Publish, retrying while the topic queue is full
async fn publish_with_retry<P: Producer>(
    producer: &P,
    topic: &str,
    payload: Bytes,
    retries: u32,
) -> std::result::Result<Ack, SendError> {
    let mut attempt = 0;
    loop {
        match producer.send(topic, payload.clone()).await {
            Err(e) if e.is_retriable() && attempt < retries => {
                attempt += 1;
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            result => return result,
        }
    }
}
