//! Producer trait - outbound publishing interface
//!
//! Contract for the production collaborator that replaces the broker producer.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Acknowledgement of a published message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Topic the message was appended to
    pub topic: String,

    /// Per-topic offset assigned to the message
    pub offset: u64,
}

/// Publishing failure, surfaced synchronously to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Producer does not know the topic
    #[error("no such topic '{topic}'")]
    UnknownTopic { topic: String },

    /// Topic queue is at capacity
    #[error("topic '{topic}' is full")]
    Full { topic: String },

    /// Producer has been shut down
    #[error("topic '{topic}' is closed")]
    Closed { topic: String },
}

impl SendError {
    /// Whether retrying the same send later may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Full { .. })
    }
}

/// Message publishing trait
#[trait_variant::make(Producer: Send)]
pub trait LocalProducer {
    /// Publish `payload` to `topic`
    ///
    /// # Errors
    /// Returns `SendError` when the message was not accepted
    async fn send(&self, topic: &str, payload: Bytes) -> Result<Ack, SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_full_is_retriable() {
        assert!(SendError::Full { topic: "SOURCE".into() }.is_retriable());
        assert!(!SendError::Closed { topic: "SOURCE".into() }.is_retriable());
        assert!(!SendError::UnknownTopic { topic: "FOO".into() }.is_retriable());
    }
}
