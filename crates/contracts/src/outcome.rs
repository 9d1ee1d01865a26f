//! Outcome - dispatcher output
//!
//! Terminal result of a single `submit` call plus the failure event emitted
//! to the error reporter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Record;

/// Terminal outcome of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Processed by the named sink
    Delivered(String),
    /// Failed and reported
    Failed(FailureReason),
}

impl Outcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    /// Sink name for delivered records
    pub fn sink(&self) -> Option<&str> {
        match self {
            Self::Delivered(sink) => Some(sink),
            Self::Failed(_) => None,
        }
    }

    /// Failure reason for failed records
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Delivered(_) => None,
            Self::Failed(reason) => Some(reason),
        }
    }

    /// Stable label for metrics ("delivered" or the failure kind)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered(_) => "delivered",
            Self::Failed(reason) => reason.kind().as_str(),
        }
    }
}

/// Why a record failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Topic label has no route
    #[error("unknown topic '{topic}'")]
    UnknownTopic { topic: String },

    /// Payload is not a structured key-value mapping
    #[error("payload parse error: {message}")]
    ParseError { message: String },

    /// Sink processing function failed
    #[error("sink '{sink}' failed: {message}")]
    SinkError { sink: String, message: String },
}

impl FailureReason {
    pub fn unknown_topic(topic: impl Into<String>) -> Self {
        Self::UnknownTopic {
            topic: topic.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    pub fn sink_error(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkError {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnknownTopic { .. } => FailureKind::UnknownTopic,
            Self::ParseError { .. } => FailureKind::ParseError,
            Self::SinkError { .. } => FailureKind::SinkError,
        }
    }
}

/// Failure category without details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownTopic,
    ParseError,
    SinkError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTopic => "unknown_topic",
            Self::ParseError => "parse_error",
            Self::SinkError => "sink_error",
        }
    }
}

/// Structured failure event handed to the error reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    /// Topic label of the failed record
    pub topic: String,

    /// Leading part of the raw payload
    pub payload_excerpt: String,

    /// Failure reason
    pub reason: FailureReason,

    /// Receive sequence of the failed record
    pub sequence: u64,

    /// When the failure was observed
    pub timestamp: DateTime<Utc>,
}

impl FailureEvent {
    /// Build an event for `record`, keeping at most `excerpt_chars` payload characters
    pub fn new(record: &Record, reason: FailureReason, excerpt_chars: usize) -> Self {
        Self {
            topic: record.topic.clone(),
            payload_excerpt: record.excerpt(excerpt_chars),
            reason,
            sequence: record.sequence,
            timestamp: Utc::now(),
        }
    }
}
