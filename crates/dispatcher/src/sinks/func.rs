//! FnSink - a named sink backed by a closure

use contracts::{ContractError, ParsedRecord, RecordSink};

/// Sink that hands each record to a synchronous function
pub struct FnSink<F> {
    name: String,
    func: F,
}

impl<F> FnSink<F>
where
    F: Fn(&ParsedRecord) -> Result<(), ContractError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> RecordSink for FnSink<F>
where
    F: Fn(&ParsedRecord) -> Result<(), ContractError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, record: &ParsedRecord) -> Result<(), ContractError> {
        (self.func)(record)
    }

    async fn flush(&self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Record;
    use serde_json::Map;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_fn_sink_calls_function() {
        let seen = AtomicU64::new(0);
        let sink = FnSink::new("count", |record: &ParsedRecord| {
            seen.fetch_add(record.sequence(), Ordering::Relaxed);
            Ok(())
        });
        let record = ParsedRecord::new(Record::new("T", "{}", 5), Map::new());

        sink.process(&record).await.unwrap();
        assert_eq!(sink.name(), "count");
        assert_eq!(seen.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_fn_sink_propagates_error() {
        let sink = FnSink::new("reject", |_: &ParsedRecord| {
            Err(ContractError::sink_write("reject", "no thanks"))
        });
        let record = ParsedRecord::new(Record::new("T", "{}", 1), Map::new());

        let err = sink.process(&record).await.unwrap_err();
        assert!(err.to_string().contains("no thanks"));
    }
}
