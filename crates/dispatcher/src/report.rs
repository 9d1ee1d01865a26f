//! Error reporter implementations

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ErrorReporter, FailureEvent};
use observability::record_failure_event;
use tracing::error;

/// Reports failures as structured tracing events plus a metric
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, event: &FailureEvent) {
        record_failure_event(event);
        error!(
            topic = %event.topic,
            sequence = event.sequence,
            kind = event.reason.kind().as_str(),
            reason = %event.reason,
            payload = %event.payload_excerpt,
            timestamp = %event.timestamp,
            "Record failed"
        );
    }
}

/// Keeps every reported event in memory
#[derive(Debug, Default)]
pub struct MemoryErrorReporter {
    events: Mutex<Vec<FailureEvent>>,
}

impl MemoryErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events so far
    pub fn events(&self) -> Vec<FailureEvent> {
        self.lock().clone()
    }

    /// Remove and return all events so far
    pub fn take(&self) -> Vec<FailureEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FailureEvent>> {
        // A panic while holding the lock cannot leave the Vec half-written
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ErrorReporter for MemoryErrorReporter {
    fn report(&self, event: &FailureEvent) {
        self.lock().push(event.clone());
    }
}

/// Forwards each event to several reporters in order
#[derive(Default, Clone)]
pub struct FanoutErrorReporter {
    reporters: Vec<Arc<dyn ErrorReporter>>,
}

impl FanoutErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl ErrorReporter for FanoutErrorReporter {
    fn report(&self, event: &FailureEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}
