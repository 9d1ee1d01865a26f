//! Config parsing
//!
//! Supports TOML (primary) and JSON.

use contracts::{ContractError, RouterBlueprint};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML config
pub fn parse_toml(content: &str) -> Result<RouterBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON config
pub fn parse_json(content: &str) -> Result<RouterBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse config in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<RouterBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[routes]]
topic = "EVEN"
[routes.sink]
name = "even_log"
sink_type = "log"
queue_capacity = 10
max_concurrency = 2
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.ingress_topic, "SOURCE");
        assert_eq!(bp.routes.len(), 1);
        assert_eq!(bp.routes[0].sink.sink_type, SinkType::Log);
        assert_eq!(bp.routes[0].sink.queue_capacity, 10);
        assert_eq!(bp.routes[0].sink.max_concurrency, 2);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "ingress_topic": "SOURCE",
            "reporting": { "excerpt_chars": 32 },
            "routes": [
                { "topic": "SOURCE", "sink": { "name": "src", "sink_type": "age_parity" } },
                { "topic": "EVEN", "sink": { "name": "even", "sink_type": "log" } },
                { "topic": "ODD", "sink": { "name": "odd", "sink_type": "log" } }
            ]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.reporting.excerpt_chars, 32);
        assert_eq!(bp.routes[0].sink.sink_type, SinkType::AgeParity);
    }

    #[test]
    fn test_parse_unknown_sink_type() {
        let content = r#"
[[routes]]
topic = "EVEN"
[routes.sink]
name = "even"
sink_type = "kafka"
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
