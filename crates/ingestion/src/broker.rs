//! In-process message broker
//!
//! One bounded queue per topic. Publishing never blocks: a full queue is
//! reported back to the producer as `SendError::Full`. Consumers pull through
//! `subscribe` and acknowledge with `commit`; `wait_idle` resolves once every
//! accepted message has been committed.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use bytes::Bytes;
use contracts::{Ack, Producer, RouterBlueprint, SendError};
use observability::record_send;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{IngestionError, Result};

/// A message sitting in a topic queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the message was published to
    pub topic: String,

    /// Per-topic offset, starting at 0
    pub offset: u64,

    /// Opaque payload
    pub payload: Bytes,
}

struct TopicQueue {
    tx: Sender<Message>,
    rx: Receiver<Message>,
    /// Next offset to hand out; locked across `try_send` so offsets have no gaps
    next_offset: Mutex<u64>,
    commits: Mutex<CommitLog>,
}

impl TopicQueue {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            next_offset: Mutex::new(0),
            commits: Mutex::new(CommitLog::default()),
        }
    }

    fn issued(&self) -> u64 {
        *self.next_offset.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commits(&self) -> MutexGuard<'_, CommitLog> {
        self.commits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Committed offsets of one topic
///
/// Consumers sharing a topic may commit out of order; offsets above the
/// watermark wait in `ahead` until the gap below them closes.
#[derive(Debug, Default)]
struct CommitLog {
    /// Every offset below this one is committed
    watermark: u64,
    ahead: BTreeSet<u64>,
}

impl CommitLog {
    /// Record `offset`, returning false if it was already committed
    fn commit(&mut self, offset: u64) -> bool {
        if offset < self.watermark || !self.ahead.insert(offset) {
            return false;
        }
        while self.ahead.remove(&self.watermark) {
            self.watermark += 1;
        }
        true
    }
}

/// Bounded in-memory broker implementing `Producer`
pub struct MemoryBroker {
    topics: HashMap<String, TopicQueue>,
    /// Accepted but not yet committed messages
    pending: AtomicUsize,
    idle: Notify,
}

impl MemoryBroker {
    /// Create a broker with one queue per topic
    pub fn new<I, T>(topics: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let topics = topics
            .into_iter()
            .map(|topic| (topic.into(), TopicQueue::new(capacity)))
            .collect();

        Self {
            topics,
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Create a broker with a queue for every routed topic
    pub fn from_blueprint(blueprint: &RouterBlueprint) -> Self {
        Self::new(blueprint.topics(), blueprint.broker.topic_capacity)
    }

    /// Topic labels with a queue, sorted
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.topics.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Messages waiting in a topic queue
    pub fn queue_len(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |q| q.tx.len())
    }

    /// Accepted messages not committed yet
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Offset below which every message of `topic` is committed
    pub fn committed_offset(&self, topic: &str) -> Option<u64> {
        self.topics.get(topic).map(|q| q.commits().watermark)
    }

    /// Append a payload to a topic queue without waiting
    #[instrument(name = "broker_publish", skip(self, payload), fields(topic = %topic))]
    pub fn publish(&self, topic: &str, payload: Bytes) -> std::result::Result<Ack, SendError> {
        let result = self.try_publish(topic, payload);
        record_send(topic, result.is_ok());
        result
    }

    fn try_publish(&self, topic: &str, payload: Bytes) -> std::result::Result<Ack, SendError> {
        let queue = self
            .topics
            .get(topic)
            .ok_or_else(|| SendError::UnknownTopic {
                topic: topic.to_string(),
            })?;

        let mut next_offset = queue
            .next_offset
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let offset = *next_offset;
        let message = Message {
            topic: topic.to_string(),
            offset,
            payload,
        };

        // Counted before the message becomes visible to consumers
        self.pending.fetch_add(1, Ordering::SeqCst);
        match queue.tx.try_send(message) {
            Ok(()) => {
                *next_offset += 1;
                trace!(topic = %topic, offset, "Message accepted");
                Ok(Ack {
                    topic: topic.to_string(),
                    offset,
                })
            }
            Err(e) => {
                self.release_pending();
                let topic = topic.to_string();
                Err(match e {
                    TrySendError::Full(_) => SendError::Full { topic },
                    TrySendError::Closed(_) => SendError::Closed { topic },
                })
            }
        }
    }

    /// Receiver for a topic queue
    ///
    /// Several receivers of the same topic compete for messages.
    pub fn subscribe(&self, topic: &str) -> Result<Receiver<Message>> {
        self.topics
            .get(topic)
            .map(|q| q.rx.clone())
            .ok_or_else(|| IngestionError::UnknownTopic {
                topic: topic.to_string(),
            })
    }

    /// Mark a received message as fully handled
    ///
    /// Unknown topics, offsets never handed out and repeated commits are ignored.
    pub fn commit(&self, topic: &str, offset: u64) {
        let Some(queue) = self.topics.get(topic) else {
            warn!(topic = %topic, offset, "Commit for unknown topic ignored");
            return;
        };
        if offset >= queue.issued() {
            warn!(topic = %topic, offset, "Commit for unpublished offset ignored");
            return;
        }
        if !queue.commits().commit(offset) {
            warn!(topic = %topic, offset, "Duplicate commit ignored");
            return;
        }
        self.release_pending();
    }

    fn release_pending(&self) {
        let released = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if released == Ok(1) {
            self.idle.notify_waiters();
        }
    }

    /// Resolve once every accepted message has been committed
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting messages
    ///
    /// Consumers still receive what is queued, then their receivers end.
    #[instrument(name = "broker_close", skip(self))]
    pub fn close(&self) {
        for (topic, queue) in &self.topics {
            queue.tx.close();
            debug!(topic = %topic, queued = queue.tx.len(), "Topic closed");
        }
        info!(topics = self.topics.len(), "Broker closed");
    }

    /// Pull one queued message without waiting (for inspection)
    pub fn try_take(&self, topic: &str) -> Option<Message> {
        let queue = self.topics.get(topic)?;
        match queue.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Closed) => None,
        }
    }
}

impl Producer for MemoryBroker {
    async fn send(&self, topic: &str, payload: Bytes) -> std::result::Result<Ack, SendError> {
        self.publish(topic, payload)
    }
}
