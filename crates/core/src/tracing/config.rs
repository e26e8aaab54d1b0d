//! Configuration for tracing output

use crate::config::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Subscriber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Log level filter (e.g., "info", "debug", "shopdesk_http=trace")
    pub log_level: String,
    /// Emit JSON lines
    #[serde(default)]
    pub json: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            service_name: "shopdesk".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl InstrumentationConfig {
    /// Build from the `[logging]` section; `RUST_LOG` still wins at init time
    pub fn from_logging(service_name: impl Into<String>, logging: &LoggingConfig) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: logging.level.clone(),
            json: logging.json,
            ..Self::default()
        }
    }
}
