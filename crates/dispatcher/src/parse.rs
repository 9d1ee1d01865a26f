//! Stateless payload decoding

use contracts::FailureReason;
use serde_json::{Map, Value};

/// Decode a payload as a JSON object
///
/// Anything that is not a JSON object (invalid JSON, arrays, scalars, `null`,
/// blank payloads) is a `ParseError`. Parse errors are never transient.
pub fn parse_payload(payload: &[u8]) -> Result<Map<String, Value>, FailureReason> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(FailureReason::parse_error("empty payload"));
    }

    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(FailureReason::parse_error(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
        Err(e) => Err(FailureReason::parse_error(e.to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FailureKind;

    #[test]
    fn test_parse_object() {
        let map = parse_payload(br#"{"n":2,"name":"Ada"}"#).unwrap();
        assert_eq!(map.get("n"), Some(&Value::from(2)));
        assert_eq!(map.get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn test_parse_nested_object() {
        let map = parse_payload(br#"{"user":{"address":"Main St"}}"#).unwrap();
        assert_eq!(map["user"]["address"], "Main St");
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_payload(b"not-json").unwrap_err();
        assert_eq!(err.kind(), FailureKind::ParseError);
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        for payload in [&b"[1,2]"[..], b"5", b"\"text\"", b"null", b"true"] {
            let err = parse_payload(payload).unwrap_err();
            assert!(
                err.to_string().contains("expected a JSON object"),
                "payload {:?} gave {err}",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert_eq!(
            parse_payload(b"").unwrap_err(),
            FailureReason::parse_error("empty payload")
        );
        assert_eq!(
            parse_payload(b"  \n").unwrap_err(),
            FailureReason::parse_error("empty payload")
        );
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let err = parse_payload(&[b'{', 0xff, b'}']).unwrap_err();
        assert_eq!(err.kind(), FailureKind::ParseError);
    }
}
