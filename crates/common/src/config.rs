//! Common configuration types for chat hub components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Default tracing filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "chat_hub=info,tower_http=info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable single-line output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is absent
    pub log_filter: String,
    /// Log line format
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ObservabilityConfig {
    /// Read `RUST_LOG` and `HUB_LOG_FORMAT` from a variable map.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if `HUB_LOG_FORMAT` is not a known format.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, String> {
        let log_filter = vars
            .get("RUST_LOG")
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_format = match vars.get("HUB_LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            log_filter,
            log_format,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ObservabilityConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_json_format_case_insensitive() {
        let vars = HashMap::from([("HUB_LOG_FORMAT".to_string(), "JSON".to_string())]);
        let config = ObservabilityConfig::from_vars(&vars).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_rust_log_overrides_default_filter() {
        let vars = HashMap::from([("RUST_LOG".to_string(), "debug".to_string())]);
        let config = ObservabilityConfig::from_vars(&vars).unwrap();
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_unknown_format_rejected() {
        let vars = HashMap::from([("HUB_LOG_FORMAT".to_string(), "xml".to_string())]);
        let err = ObservabilityConfig::from_vars(&vars).unwrap_err();
        assert!(err.contains("xml"));
    }
}
