//! LogSink - logs every processed record via tracing

use contracts::{ContractError, ParsedRecord, RecordSink};
use tracing::{info, instrument};

/// Sink that logs each record's topic and decoded data
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RecordSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_process",
        skip(self, record),
        fields(sink = %self.name, sequence = record.sequence())
    )]
    async fn process(&self, record: &ParsedRecord) -> Result<(), ContractError> {
        let data = serde_json::to_string(&record.data)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        info!(
            sink = %self.name,
            topic = %record.topic(),
            sequence = record.sequence(),
            data = %data,
            "Processed message"
        );
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Record;
    use serde_json::json;

    #[tokio::test]
    async fn test_log_sink_process() {
        let sink = LogSink::new("EVEN");
        let data = json!({"name": "Ada", "dateOfBirth": "1990-01-01"});
        let record = ParsedRecord::new(
            Record::new("EVEN", data.to_string(), 3),
            data.as_object().cloned().unwrap(),
        );

        assert!(sink.process(&record).await.is_ok());
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
