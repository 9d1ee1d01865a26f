//! # Dispatcher
//!
//! Topic routing module.
//!
//! Responsibilities:
//! - Classify each `Record` by topic against a fixed routing table
//! - Decode payloads and hand them to the topic's sink
//! - Isolate slow or failing sinks so they never block other topics
//! - Turn every failure into an `Outcome` plus a reported `FailureEvent`

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod parse;
pub mod report;
pub mod sinks;

pub use contracts::{Outcome, Record, RecordSink};
pub use dispatcher::{
    create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig, NoProducer,
    DEFAULT_EXCERPT_CHARS,
};
pub use error::DispatcherError;
pub use handle::{SinkHandle, SinkSettings};
pub use metrics::{DispatchStats, DispatchStatsSnapshot, MetricsSnapshot, SinkMetrics};
pub use parse::parse_payload;
pub use report::{FanoutErrorReporter, MemoryErrorReporter, TracingErrorReporter};
pub use sinks::{AgeParityConfig, AgeParitySink, FileSink, FileSinkConfig, FnSink, LogSink};
