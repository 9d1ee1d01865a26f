//! SinkHandle - manages a sink with an isolated queue and worker task
//!
//! Each handle owns a bounded queue. The worker pulls jobs in arrival order and
//! runs at most `max_concurrency` of them at a time. With the default of one,
//! a record's processing completes before the next one for the same sink starts.
//! Every invocation runs in its own task so a panicking sink only fails the
//! record it was processing.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, instrument};

use contracts::{FailureReason, ParsedRecord, RecordSink, SinkConfig, MAX_SINK_CONCURRENCY};
use observability::{record_queue_depth, record_sink_latency_ms};

use crate::metrics::SinkMetrics;

/// Queue and concurrency settings for one sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSettings {
    /// Records that may wait in the queue
    pub queue_capacity: usize,
    /// Records processed in parallel, clamped to `1..=MAX_SINK_CONCURRENCY`
    pub max_concurrency: usize,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            max_concurrency: 1,
        }
    }
}

impl From<&SinkConfig> for SinkSettings {
    fn from(config: &SinkConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            max_concurrency: config.max_concurrency,
        }
    }
}

/// A record waiting for the worker, with the channel its result goes back on
struct Job {
    record: ParsedRecord,
    reply: oneshot::Sender<Result<(), String>>,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send jobs to worker
    tx: mpsc::Sender<Job>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S>(sink: S, settings: SinkSettings) -> Self
    where
        S: RecordSink + Sync + 'static,
    {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let max_concurrency = settings.max_concurrency.clamp(1, MAX_SINK_CONCURRENCY);

        let worker_handle = tokio::spawn(async move {
            sink_worker(
                Arc::new(sink),
                rx,
                worker_metrics,
                worker_name,
                max_concurrency,
            )
            .await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a record to the sink and wait for its result
    ///
    /// Waits for queue space when the queue is full. Returns `SinkError` when the
    /// sink fails, panics, or its worker is gone.
    pub async fn deliver(&self, record: ParsedRecord) -> Result<(), FailureReason> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            record,
            reply: reply_tx,
        };

        if self.tx.send(job).await.is_err() {
            error!(sink = %self.name, "Sink worker closed unexpectedly");
            return Err(FailureReason::sink_error(&self.name, "sink worker stopped"));
        }

        let depth = self.tx.max_capacity() - self.tx.capacity();
        self.metrics.set_queue_len(depth);
        record_queue_depth(&self.name, depth);

        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(FailureReason::sink_error(&self.name, message)),
            Err(_) => Err(FailureReason::sink_error(
                &self.name,
                "sink worker dropped the record",
            )),
        }
    }

    /// Shutdown the sink worker gracefully
    ///
    /// Queued records are still processed before the sink is flushed and closed.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that pulls jobs and runs them against the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S>(
    sink: Arc<S>,
    mut rx: mpsc::Receiver<Job>,
    metrics: Arc<SinkMetrics>,
    name: String,
    max_concurrency: usize,
) where
    S: RecordSink + Sync + 'static,
{
    debug!(sink = %name, max_concurrency, "Sink worker started");

    let permits = Arc::new(Semaphore::new(max_concurrency));

    while let Some(job) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        // The semaphore is never closed
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };

        let sink = Arc::clone(&sink);
        let metrics = Arc::clone(&metrics);
        let name = name.clone();
        metrics.inc_in_flight();

        tokio::spawn(async move {
            let result = process_isolated(sink, job.record, &name, &metrics).await;
            metrics.dec_in_flight();
            // The submitter may have stopped waiting
            let _ = job.reply.send(result);
            drop(permit);
        });
    }

    // Wait for in-flight records before flushing
    let all = u32::try_from(max_concurrency).unwrap_or(u32::MAX);
    if permits.acquire_many(all).await.is_err() {
        error!(sink = %name, "Failed to wait for in-flight records");
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

/// Run one record through the sink in its own task
async fn process_isolated<S>(
    sink: Arc<S>,
    record: ParsedRecord,
    name: &str,
    metrics: &SinkMetrics,
) -> Result<(), String>
where
    S: RecordSink + Sync + 'static,
{
    let sequence = record.sequence();
    let started = Instant::now();

    let task = tokio::spawn(async move { sink.process(&record).await });

    let result = match task.await {
        Ok(Ok(())) => {
            metrics.inc_delivered_count();
            Ok(())
        }
        Ok(Err(e)) => {
            metrics.inc_failure_count();
            error!(sink = %name, sequence, error = %e, "Process failed");
            Err(e.to_string())
        }
        Err(join_error) => {
            metrics.inc_panic_count();
            let message = panic_message(join_error);
            error!(sink = %name, sequence, error = %message, "Sink panicked");
            Err(message)
        }
    };

    record_sink_latency_ms(name, started.elapsed().as_secs_f64() * 1000.0);
    result
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("sink task cancelled: {err}");
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("sink panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("sink panicked: {message}")
    } else {
        "sink panicked".to_string()
    }
}
