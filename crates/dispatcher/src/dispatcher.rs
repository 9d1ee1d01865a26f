//! Dispatcher - classifies records and routes them to their topic's sink

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use contracts::{
    Ack, ErrorReporter, FailureEvent, FailureReason, Outcome, ParsedRecord, Producer, Record,
    RouteConfig, RouterBlueprint, SendError, SinkConfig, SinkType,
};
use observability::{record_outcome, record_record_received};

use crate::error::DispatcherError;
use crate::handle::{SinkHandle, SinkSettings};
use crate::metrics::{DispatchStats, DispatchStatsSnapshot, MetricsSnapshot};
use crate::parse::parse_payload;
use crate::report::TracingErrorReporter;
use crate::sinks::{AgeParitySink, FileSink, LogSink};

/// Default payload excerpt length in failure events
pub const DEFAULT_EXCERPT_CHARS: usize = 256;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Routing table, one sink per topic
    pub routes: Vec<RouteConfig>,
    /// Payload excerpt length in failure events
    pub excerpt_chars: usize,
}

impl DispatcherConfig {
    pub fn new(routes: Vec<RouteConfig>) -> Self {
        Self {
            routes,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    pub fn from_blueprint(blueprint: &RouterBlueprint) -> Self {
        Self {
            routes: blueprint.routes.clone(),
            excerpt_chars: blueprint.reporting.excerpt_chars,
        }
    }
}

/// Stand-in producer for dispatchers that never forward
///
/// Building an `age_parity` sink without a real producer is an error, so this
/// type is never called.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProducer;

impl Producer for NoProducer {
    async fn send(&self, topic: &str, _payload: Bytes) -> Result<Ack, SendError> {
        Err(SendError::UnknownTopic {
            topic: topic.to_string(),
        })
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder<P = NoProducer> {
    config: DispatcherConfig,
    producer: Option<Arc<P>>,
    reporter: Arc<dyn ErrorReporter>,
    extra_routes: Vec<(String, SinkHandle)>,
}

impl DispatcherBuilder<NoProducer> {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            producer: None,
            reporter: Arc::new(TracingErrorReporter),
            extra_routes: Vec::new(),
        }
    }
}

impl<P> DispatcherBuilder<P>
where
    P: Producer + Sync + 'static,
{
    /// Producer used by forwarding sinks
    pub fn producer<Q>(self, producer: Arc<Q>) -> DispatcherBuilder<Q>
    where
        Q: Producer + Sync + 'static,
    {
        DispatcherBuilder {
            config: self.config,
            producer: Some(producer),
            reporter: self.reporter,
            extra_routes: self.extra_routes,
        }
    }

    /// Collaborator that receives every failure event
    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Route a topic to an already running sink
    pub fn route(mut self, topic: impl Into<String>, handle: SinkHandle) -> Self {
        self.extra_routes.push((topic.into(), handle));
        self
    }

    /// Build the routing table and start every sink worker
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(route_count = self.config.routes.len() + self.extra_routes.len())
    )]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut routes = HashMap::with_capacity(self.config.routes.len());

        for route in &self.config.routes {
            let handle = create_sink_handle(&route.sink, self.producer.as_ref())?;
            insert_route(&mut routes, route.topic.clone(), handle)?;
        }
        for (topic, handle) in self.extra_routes {
            insert_route(&mut routes, topic, handle)?;
        }

        info!(routes = routes.len(), "Dispatcher ready");

        Ok(Dispatcher {
            routes,
            reporter: self.reporter,
            stats: DispatchStats::new(),
            excerpt_chars: self.config.excerpt_chars,
        })
    }
}

fn insert_route(
    routes: &mut HashMap<String, SinkHandle>,
    topic: String,
    handle: SinkHandle,
) -> Result<(), DispatcherError> {
    match routes.entry(topic) {
        Entry::Occupied(entry) => Err(DispatcherError::DuplicateTopic {
            topic: entry.key().clone(),
        }),
        Entry::Vacant(entry) => {
            debug!(topic = %entry.key(), sink = %handle.name(), "Route registered");
            entry.insert(handle);
            Ok(())
        }
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config, producer),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle<P>(
    config: &SinkConfig,
    producer: Option<&Arc<P>>,
) -> Result<SinkHandle, DispatcherError>
where
    P: Producer + Sync + 'static,
{
    let settings = SinkSettings::from(config);
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, settings))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, settings))
        }
        SinkType::AgeParity => {
            let producer = producer.ok_or_else(|| {
                DispatcherError::sink_creation(&config.name, "age_parity sink needs a producer")
            })?;
            let sink =
                AgeParitySink::from_params(&config.name, &config.params, Arc::clone(producer))
                    .map_err(|e| DispatcherError::sink_creation(&config.name, e))?;
            Ok(SinkHandle::spawn(sink, settings))
        }
    }
}

/// Routes each submitted record to the sink registered for its topic
///
/// Shared by reference between any number of concurrent submitters. The routing
/// table is fixed once built.
pub struct Dispatcher {
    routes: HashMap<String, SinkHandle>,
    reporter: Arc<dyn ErrorReporter>,
    stats: DispatchStats,
    excerpt_chars: usize,
}

impl Dispatcher {
    /// Start building a dispatcher
    pub fn builder(config: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Create a dispatcher from already running sinks (for testing)
    pub fn with_routes(
        routes: impl IntoIterator<Item = (String, SinkHandle)>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, DispatcherError> {
        let mut table = HashMap::new();
        for (topic, handle) in routes {
            insert_route(&mut table, topic, handle)?;
        }
        Ok(Self {
            routes: table,
            reporter,
            stats: DispatchStats::new(),
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        })
    }

    /// Routed topic labels
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Name of the sink registered for `topic`
    pub fn sink_for(&self, topic: &str) -> Option<&str> {
        self.routes.get(topic).map(SinkHandle::name)
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        let mut metrics: Vec<_> = self
            .routes
            .values()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect();
        metrics.sort_by(|a, b| a.0.cmp(&b.0));
        metrics
    }

    /// Outcome counters since the dispatcher was built
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Classify, parse and deliver one record
    ///
    /// Always returns exactly one outcome. Failures are also handed to the error
    /// reporter before returning.
    #[instrument(
        name = "dispatcher_submit",
        skip(self, record),
        fields(topic = %record.topic, sequence = record.sequence)
    )]
    pub async fn submit(&self, record: Record) -> Outcome {
        self.stats.inc_submitted();
        record_record_received(&record.topic);

        let outcome = match self.dispatch(&record).await {
            Ok(sink) => {
                self.stats.inc_delivered();
                Outcome::Delivered(sink)
            }
            Err(reason) => {
                self.stats.inc_failed(reason.kind());
                self.report(&record, &reason);
                Outcome::Failed(reason)
            }
        };

        record_outcome(&record.topic, &outcome);
        outcome
    }

    async fn dispatch(&self, record: &Record) -> Result<String, FailureReason> {
        let handle = self
            .routes
            .get(&record.topic)
            .ok_or_else(|| FailureReason::unknown_topic(&record.topic))?;

        let data = parse_payload(&record.payload)?;
        handle
            .deliver(ParsedRecord::new(record.clone(), data))
            .await?;

        Ok(handle.name().to_string())
    }

    fn report(&self, record: &Record, reason: &FailureReason) {
        let event = FailureEvent::new(record, reason.clone(), self.excerpt_chars);
        warn!(
            topic = %event.topic,
            sequence = event.sequence,
            kind = reason.kind().as_str(),
            reason = %reason,
            "Record not delivered"
        );
        self.reporter.report(&event);
    }

    /// Stop every sink worker after its queued records are processed
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        let stats = self.stats.snapshot();
        for (_, handle) in self.routes {
            handle.shutdown().await;
        }
        info!(
            submitted = stats.submitted,
            delivered = stats.delivered,
            failed = stats.failed(),
            "Dispatcher shutdown complete"
        );
    }
}

/// Convenience function to build a dispatcher from a blueprint
#[instrument(name = "dispatcher_create", skip(blueprint, producer, reporter))]
pub async fn create_dispatcher<P>(
    blueprint: &RouterBlueprint,
    producer: Arc<P>,
    reporter: Arc<dyn ErrorReporter>,
) -> Result<Dispatcher, DispatcherError>
where
    P: Producer + Sync + 'static,
{
    DispatcherBuilder::new(DispatcherConfig::from_blueprint(blueprint))
        .producer(producer)
        .reporter(reporter)
        .build()
        .await
}
