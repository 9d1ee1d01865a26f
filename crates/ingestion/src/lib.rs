//! # Ingestion Pipeline
//!
//! Broker stand-in and consumer side of the router.
//!
//! Responsibilities:
//! - Hold one bounded queue per topic (`MemoryBroker`, also the `Producer`)
//! - Consume each topic and stamp a global receive sequence
//! - Hand records to the dispatcher and commit them once an outcome exists
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MemoryBroker};
//!
//! let broker = Arc::new(MemoryBroker::from_blueprint(&blueprint));
//! let dispatcher = Arc::new(create_dispatcher(&blueprint, broker.clone(), reporter).await?);
//! let pipeline = IngestionPipeline::start(broker.clone(), dispatcher, 1)?;
//!
//! broker.send("SOURCE", payload).await?;
//! broker.wait_idle().await;
//! broker.close();
//! println!("{}", pipeline.join().await);
//! ```

mod broker;
mod metrics;
mod error;
mod pipeline;

// Re-exports
pub use broker::{MemoryBroker, Message};
pub use contracts::{Ack, Producer, SendError};
pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use pipeline::IngestionPipeline;
