//! ErrorReporter trait - failure event collaborator

use crate::FailureEvent;

/// Receives structured failure events from the dispatcher.
///
/// Called concurrently from every caller of `submit`, so implementations
/// must be `Send + Sync`. Object-safe for use behind `Arc<dyn ErrorReporter>`.
pub trait ErrorReporter: Send + Sync {
    /// Report a single failure
    fn report(&self, event: &FailureEvent);
}
