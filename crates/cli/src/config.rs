//! CLI configuration utilities

use anyhow::{Context, Result};
use shopdesk_core::ShopdeskConfig;
use std::path::Path;
use tracing::debug;

/// Load configuration from an explicit file or the default search path
pub fn load(path: Option<&Path>) -> Result<ShopdeskConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration file");
            ShopdeskConfig::load_from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))
        }
        None => ShopdeskConfig::load().context("loading configuration"),
    }
}

/// Render the effective configuration as pretty JSON
pub fn render(config: &ShopdeskConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}
