//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Broker 上没有该 topic 的队列
    #[error("no queue for topic {topic}")]
    UnknownTopic {
        /// Topic 标签
        topic: String,
    },

    /// 每个 topic 至少需要一个 consumer
    #[error("consumers_per_topic must be at least 1")]
    NoConsumers,
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
