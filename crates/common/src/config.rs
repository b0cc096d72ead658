//! Common configuration types for Huddle components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default tracing filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "room_coordinator=debug,tower_http=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parse a log format name (`text` or `json`, case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing filter directive, used when `RUST_LOG` is absent
    pub log_filter: String,
    /// Log output format
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
    /// Build from a variable map (`RUST_LOG`, `<prefix>_LOG_FORMAT`).
    ///
    /// Unknown log formats fall back to text; the caller decides whether
    /// that is an error by checking [`LogFormat::parse`] itself.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>, prefix: &str) -> Self {
        let log_filter = vars
            .get("RUST_LOG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_format = vars
            .get(&format!("{prefix}_LOG_FORMAT"))
            .and_then(|v| LogFormat::parse(v))
            .unwrap_or_default();

        Self {
            log_filter,
            log_format,
        }
    }
}
