//! Record / ParsedRecord - dispatcher input
//!
//! Raw records as delivered by the ingestion side and their decoded form.

use bytes::Bytes;
use serde_json::{Map, Value};

/// Raw record
///
/// Immutable once received. The payload is opaque until parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Topic label used for routing
    pub topic: String,

    /// Opaque payload (zero-copy)
    pub payload: Bytes,

    /// Receive order (monotonically increasing, assigned on ingestion)
    pub sequence: u64,
}

impl Record {
    /// Create a new record
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>, sequence: u64) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            sequence,
        }
    }

    /// Lossy UTF-8 prefix of the payload, at most `max_chars` characters.
    ///
    /// Truncated excerpts end with `...`.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.payload);
        let mut chars = text.chars();
        let mut excerpt: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            excerpt.push_str("...");
        }
        excerpt
    }
}

/// Decoded record
///
/// Derived from a `Record` once its payload decoded as a key-value mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    /// Source record
    pub record: Record,

    /// Decoded key-value mapping
    pub data: Map<String, Value>,
}

impl ParsedRecord {
    pub fn new(record: Record, data: Map<String, Value>) -> Self {
        Self { record, data }
    }

    pub fn topic(&self) -> &str {
        &self.record.topic
    }

    pub fn sequence(&self) -> u64 {
        self.record.sequence
    }

    /// Look up a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Look up a top-level string field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_short_payload() {
        let record = Record::new("SOURCE", r#"{"n":2}"#, 1);
        assert_eq!(record.excerpt(64), r#"{"n":2}"#);
    }

    #[test]
    fn test_excerpt_truncates() {
        let record = Record::new("SOURCE", "abcdefghij", 1);
        assert_eq!(record.excerpt(4), "abcd...");
    }

    #[test]
    fn test_excerpt_multibyte_boundary() {
        let record = Record::new("SOURCE", "äöüß", 1);
        assert_eq!(record.excerpt(2), "äö...");
    }

    #[test]
    fn test_excerpt_invalid_utf8() {
        let record = Record::new("SOURCE", Bytes::from_static(&[0x66, 0xff, 0x6f]), 1);
        assert_eq!(record.excerpt(10), "f\u{fffd}o");
    }

    #[test]
    fn test_parsed_record_accessors() {
        let mut data = Map::new();
        data.insert("name".into(), Value::String("Ada".into()));
        data.insert("n".into(), Value::from(2));
        let parsed = ParsedRecord::new(Record::new("EVEN", "{}", 7), data);

        assert_eq!(parsed.topic(), "EVEN");
        assert_eq!(parsed.sequence(), 7);
        assert_eq!(parsed.get_str("name"), Some("Ada"));
        assert_eq!(parsed.get_str("n"), None);
        assert_eq!(parsed.get("n"), Some(&Value::from(2)));
    }
}
