//! RecordSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, ParsedRecord};

/// Record processing trait
///
/// All sink implementations must implement this trait. Methods take `&self`
/// so a sink can process several records at once when its route allows
/// concurrency; sinks with mutable state lock internally.
#[trait_variant::make(RecordSink: Send)]
pub trait LocalRecordSink {
    /// Sink name (used for outcomes/logging/metrics)
    fn name(&self) -> &str;

    /// Process one parsed record
    ///
    /// # Errors
    /// Returns processing error (should include context)
    async fn process(&self, record: &ParsedRecord) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&self) -> Result<(), ContractError>;
}
