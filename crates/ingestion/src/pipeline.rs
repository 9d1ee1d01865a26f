//! Ingestion Pipeline main entry

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_channel::Receiver;
use contracts::{Outcome, Record};
use dispatcher::Dispatcher;
use observability::{OutcomeAggregator, OutcomeSummary};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::broker::{MemoryBroker, Message};
use crate::error::{IngestionError, Result};
use crate::metrics::{IngestionMetrics, MetricsSnapshot};

/// Ingestion Pipeline
///
/// Runs consumer tasks that pull messages from the broker, stamp a global
/// receive sequence, hand them to the dispatcher and commit them once the
/// outcome is known. Failed records are committed too; nothing is redelivered.
pub struct IngestionPipeline {
    /// Consumer tasks
    consumers: Vec<JoinHandle<()>>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Outcome and latency summary
    aggregator: Arc<Mutex<OutcomeAggregator>>,
}

/// State shared by every consumer task
struct ConsumerContext {
    broker: Arc<MemoryBroker>,
    dispatcher: Arc<Dispatcher>,
    sequence: AtomicU64,
    metrics: Arc<IngestionMetrics>,
    aggregator: Arc<Mutex<OutcomeAggregator>>,
}

impl IngestionPipeline {
    /// Start `consumers_per_topic` consumers for every broker topic
    ///
    /// Topics without a route are still consumed; their records fail with
    /// `UnknownTopic`.
    #[instrument(
        name = "ingestion_start",
        skip(broker, dispatcher),
        fields(topics = broker.topics().len())
    )]
    pub fn start(
        broker: Arc<MemoryBroker>,
        dispatcher: Arc<Dispatcher>,
        consumers_per_topic: usize,
    ) -> Result<Self> {
        if consumers_per_topic == 0 {
            return Err(IngestionError::NoConsumers);
        }

        let metrics = Arc::new(IngestionMetrics::new());
        let aggregator = Arc::new(Mutex::new(OutcomeAggregator::new()));
        let topics: Vec<String> = broker.topics().into_iter().map(String::from).collect();
        let ctx = Arc::new(ConsumerContext {
            broker: Arc::clone(&broker),
            dispatcher,
            sequence: AtomicU64::new(0),
            metrics: Arc::clone(&metrics),
            aggregator: Arc::clone(&aggregator),
        });

        let mut consumers = Vec::with_capacity(topics.len() * consumers_per_topic);
        for topic in topics {
            let rx = broker.subscribe(&topic)?;
            for consumer_id in 0..consumers_per_topic {
                let ctx = Arc::clone(&ctx);
                let rx = rx.clone();
                let topic = topic.clone();
                consumers.push(tokio::spawn(async move {
                    consume(ctx, rx, topic, consumer_id).await;
                }));
            }
        }

        info!(consumers = consumers.len(), "Ingestion pipeline started");

        Ok(Self {
            consumers,
            metrics,
            aggregator,
        })
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Summary of every outcome so far
    pub fn summary(&self) -> OutcomeSummary {
        lock(&self.aggregator).summary()
    }

    /// Number of running consumer tasks
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Wait for every consumer to finish
    ///
    /// Consumers end once the broker is closed and their queue is drained.
    #[instrument(name = "ingestion_join", skip(self))]
    pub async fn join(self) -> OutcomeSummary {
        for consumer in self.consumers {
            if let Err(e) = consumer.await {
                error!(error = ?e, "Consumer task panicked");
            }
        }
        let summary = lock(&self.aggregator).summary();
        info!(
            total = summary.total,
            delivered = summary.delivered,
            "Ingestion pipeline stopped"
        );
        summary
    }

    /// Stop every consumer without draining the queues
    ///
    /// Queued messages stay uncommitted. A record already handed to a sink may
    /// still finish there but is not counted in the summary.
    #[instrument(name = "ingestion_abort", skip(self))]
    pub async fn abort(self) -> OutcomeSummary {
        for consumer in &self.consumers {
            consumer.abort();
        }
        for consumer in self.consumers {
            match consumer.await {
                Err(e) if e.is_panic() => error!(error = ?e, "Consumer task panicked"),
                _ => {}
            }
        }
        let summary = lock(&self.aggregator).summary();
        warn!(
            total = summary.total,
            delivered = summary.delivered,
            "Ingestion pipeline aborted"
        );
        summary
    }
}

fn lock(aggregator: &Mutex<OutcomeAggregator>) -> MutexGuard<'_, OutcomeAggregator> {
    aggregator.lock().unwrap_or_else(PoisonError::into_inner)
}

#[instrument(
    name = "ingestion_consumer_loop",
    skip(ctx, rx),
    fields(topic = %topic, consumer = consumer_id)
)]
async fn consume(
    ctx: Arc<ConsumerContext>,
    rx: Receiver<Message>,
    topic: String,
    consumer_id: usize,
) {
    debug!("Consumer started");

    while let Ok(message) = rx.recv().await {
        ctx.metrics.record_received();
        let sequence = ctx.sequence.fetch_add(1, Ordering::Relaxed);
        let Message {
            topic: message_topic,
            offset,
            payload,
        } = message;

        let started = Instant::now();
        let outcome = ctx
            .dispatcher
            .submit(Record::new(message_topic.clone(), payload, sequence))
            .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Outcome::Delivered(_) => ctx.metrics.record_delivered(),
            Outcome::Failed(_) => ctx.metrics.record_failed(),
        }
        lock(&ctx.aggregator).update(&message_topic, &outcome, latency_ms);

        ctx.broker.commit(&message_topic, offset);
        ctx.metrics.record_committed();
    }

    debug!("Consumer stopped");
}
