//! AgeParitySink - forwards a user record to an even or odd topic by age

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use contracts::{age_parity_params, ContractError, ParsedRecord, Producer, RecordSink};
use tracing::{debug, info, instrument};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_FIELD: &str = "dateOfBirth";

/// Configuration for AgeParitySink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeParityConfig {
    /// Target for even ages
    pub even_topic: String,
    /// Target for odd ages
    pub odd_topic: String,
    /// Payload field holding the `YYYY-MM-DD` date of birth
    pub field: String,
    /// Fixed "today"; the current UTC date when unset
    pub reference_date: Option<NaiveDate>,
}

impl Default for AgeParityConfig {
    fn default() -> Self {
        Self {
            even_topic: age_parity_params::DEFAULT_EVEN_TOPIC.to_string(),
            odd_topic: age_parity_params::DEFAULT_ODD_TOPIC.to_string(),
            field: DEFAULT_FIELD.to_string(),
            reference_date: None,
        }
    }
}

impl AgeParityConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let defaults = Self::default();
        let reference_date = params
            .get("reference_date")
            .map(|raw| {
                NaiveDate::parse_from_str(raw, DATE_FORMAT)
                    .map_err(|e| format!("invalid reference_date '{raw}': {e}"))
            })
            .transpose()?;

        Ok(Self {
            even_topic: params
                .get(age_parity_params::EVEN_TOPIC)
                .cloned()
                .unwrap_or(defaults.even_topic),
            odd_topic: params
                .get(age_parity_params::ODD_TOPIC)
                .cloned()
                .unwrap_or(defaults.odd_topic),
            field: params.get("field").cloned().unwrap_or(defaults.field),
            reference_date,
        })
    }

    /// Topic a record with this age goes to
    pub fn target_for(&self, age: u32) -> &str {
        if age % 2 == 0 {
            &self.even_topic
        } else {
            &self.odd_topic
        }
    }
}

/// Whole years between `born` and `today`, `None` if `born` is in the future
pub fn age_in_years(born: NaiveDate, today: NaiveDate) -> Option<u32> {
    if born > today {
        return None;
    }
    let mut age = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// Sink that republishes the raw payload to the even or odd topic
pub struct AgeParitySink<P> {
    name: String,
    config: AgeParityConfig,
    producer: Arc<P>,
}

impl<P> AgeParitySink<P>
where
    P: Producer + Sync,
{
    pub fn new(name: impl Into<String>, config: AgeParityConfig, producer: Arc<P>) -> Self {
        Self {
            name: name.into(),
            config,
            producer,
        }
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
        producer: Arc<P>,
    ) -> Result<Self, String> {
        Ok(Self::new(name, AgeParityConfig::from_params(params)?, producer))
    }

    pub fn config(&self) -> &AgeParityConfig {
        &self.config
    }

    fn age_of(&self, record: &ParsedRecord) -> Result<u32, ContractError> {
        let field = &self.config.field;
        let raw = record
            .get_str(field)
            .ok_or_else(|| ContractError::payload_field(field, "missing or not a string"))?;
        let born = NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
            ContractError::payload_field(field, format!("'{raw}' is not YYYY-MM-DD: {e}"))
        })?;
        let today = self
            .config
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());

        age_in_years(born, today)
            .ok_or_else(|| ContractError::payload_field(field, format!("'{raw}' is in the future")))
    }
}

impl<P> RecordSink for AgeParitySink<P>
where
    P: Producer + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "age_parity_sink_process",
        skip(self, record),
        fields(sink = %self.name, sequence = record.sequence())
    )]
    async fn process(&self, record: &ParsedRecord) -> Result<(), ContractError> {
        let age = self.age_of(record)?;
        let target = self.config.target_for(age);

        let ack = self
            .producer
            .send(target, record.record.payload.clone())
            .await?;

        info!(
            sink = %self.name,
            sequence = record.sequence(),
            age,
            target = %ack.topic,
            offset = ack.offset,
            "Record forwarded by age parity"
        );
        Ok(())
    }

    async fn flush(&self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "AgeParitySink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{Ack, Record, SendError};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Producer that remembers what it was asked to send
    #[derive(Default)]
    struct RecordingProducer {
        sent: Mutex<Vec<(String, Bytes)>>,
        reject: bool,
    }

    impl Producer for RecordingProducer {
        async fn send(&self, topic: &str, payload: Bytes) -> Result<Ack, SendError> {
            if self.reject {
                return Err(SendError::Full {
                    topic: topic.to_string(),
                });
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push((topic.to_string(), payload));
            Ok(Ack {
                topic: topic.to_string(),
                offset: sent.len() as u64 - 1,
            })
        }
    }

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn sink(producer: Arc<RecordingProducer>) -> AgeParitySink<RecordingProducer> {
        let config = AgeParityConfig {
            reference_date: Some(reference()),
            ..AgeParityConfig::default()
        };
        AgeParitySink::new("SOURCE", config, producer)
    }

    fn user(dob: Value) -> ParsedRecord {
        let data = json!({"name": "Ada", "address": "12 Analytical St", "dateOfBirth": dob});
        ParsedRecord::new(
            Record::new("SOURCE", data.to_string(), 1),
            data.as_object().cloned().unwrap(),
        )
    }

    #[test]
    fn test_age_in_years() {
        let today = reference();
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();

        assert_eq!(age_in_years(date(1990, 6, 15), today), Some(34));
        assert_eq!(age_in_years(date(1990, 6, 16), today), Some(33));
        assert_eq!(age_in_years(date(2024, 6, 15), today), Some(0));
        assert_eq!(age_in_years(date(2024, 6, 16), today), None);
        assert_eq!(age_in_years(date(2000, 2, 29), today), Some(24));
    }

    #[tokio::test]
    async fn test_even_age_goes_to_even_topic() {
        let producer = Arc::new(RecordingProducer::default());
        let sink = sink(Arc::clone(&producer));
        let record = user(json!("1990-06-15"));

        sink.process(&record).await.unwrap();

        let sent = producer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "EVEN");
        // The raw payload is forwarded untouched
        assert_eq!(sent[0].1, record.record.payload);
    }

    #[tokio::test]
    async fn test_odd_age_goes_to_odd_topic() {
        let producer = Arc::new(RecordingProducer::default());
        let sink = sink(Arc::clone(&producer));

        sink.process(&user(json!("1990-06-16"))).await.unwrap();

        assert_eq!(producer.sent.lock().unwrap()[0].0, "ODD");
    }

    #[tokio::test]
    async fn test_rejects_bad_dates() {
        let producer = Arc::new(RecordingProducer::default());
        let sink = sink(Arc::clone(&producer));

        for dob in [json!("15/06/1990"), json!(19900615), json!("2030-01-01")] {
            let err = sink.process(&user(dob)).await.unwrap_err();
            assert!(err.to_string().contains("dateOfBirth"), "{err}");
        }

        let data = json!({"name": "Ada"});
        let record = ParsedRecord::new(
            Record::new("SOURCE", data.to_string(), 2),
            data.as_object().cloned().unwrap(),
        );
        assert!(sink.process(&record).await.is_err());
        assert!(producer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_error_fails_record() {
        let producer = Arc::new(RecordingProducer {
            reject: true,
            ..Default::default()
        });
        let sink = sink(producer);

        let err = sink.process(&user(json!("1990-06-15"))).await.unwrap_err();
        assert!(matches!(err, ContractError::Send(SendError::Full { .. })));
    }

    #[test]
    fn test_config_from_params() {
        let params = HashMap::from([
            ("even_topic".to_string(), "PAIR".to_string()),
            ("odd_topic".to_string(), "IMPAIR".to_string()),
            ("reference_date".to_string(), "2024-06-15".to_string()),
        ]);
        let config = AgeParityConfig::from_params(&params).unwrap();

        assert_eq!(config.target_for(34), "PAIR");
        assert_eq!(config.target_for(33), "IMPAIR");
        assert_eq!(config.field, "dateOfBirth");
        assert_eq!(config.reference_date, Some(reference()));

        let bad = HashMap::from([("reference_date".to_string(), "June".to_string())]);
        assert!(AgeParityConfig::from_params(&bad).is_err());
    }
}
