//! Shopdesk configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML/YAML
//! file, then `SHOPDESK__*` environment variables
//! (e.g. `SHOPDESK__API__BASE_URL`).

use crate::error::{CoreError, CoreResult};
use crate::validation::{ValidateConfig, validators};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopdeskConfig {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Navigation targets used on session changes
    #[serde(default)]
    pub routes: RoutesConfig,
    /// Session persistence
    #[serde(default)]
    pub session: SessionConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; the refresh endpoint lives at `<base_url>/api/auth/refresh-token`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent sent on every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// The two logical views this client ever navigates to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_sign_in_route")]
    pub sign_in: String,
    #[serde(default = "default_dashboard_route")]
    pub dashboard: String,
}

/// Session persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// JSON file holding `auth_token`, `refresh_token` and `expires_at`.
    /// Defaults to `<data dir>/shopdesk/session.json`.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("shopdesk/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_sign_in_route() -> String {
    "/sign-in".to_string()
}

fn default_dashboard_route() -> String {
    "/dashboard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            sign_in: default_sign_in_route(),
            dashboard: default_dashboard_route(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ApiConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    /// Resolve the session file path, falling back to the user data directory
    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shopdesk")
                .join("session.json")
        })
    }
}

impl ShopdeskConfig {
    /// Load configuration from well-known file locations and the environment
    pub fn load() -> CoreResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let config_paths = [
            "shopdesk.toml",
            "config/shopdesk.toml",
            "/etc/shopdesk/shopdesk.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SHOPDESK")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate().map_err(CoreError::invalid)?;
        Ok(config)
    }

    /// Load configuration from a specific config file
    pub fn load_from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let builder = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SHOPDESK")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate().map_err(CoreError::invalid)?;
        Ok(config)
    }
}

impl ValidateConfig for ShopdeskConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validators::validate_url(&self.api.base_url, "api.base_url")?;
        validators::validate_range(self.api.timeout_secs, 1, 600, "api.timeout_secs")?;
        validators::validate_not_empty(&self.api.user_agent, "api.user_agent")?;
        validators::validate_route(&self.routes.sign_in, "routes.sign_in")?;
        validators::validate_route(&self.routes.dashboard, "routes.dashboard")?;
        if self.routes.sign_in == self.routes.dashboard {
            return Err(ConfigError::Message(
                "routes: sign_in and dashboard must differ".to_string(),
            ));
        }
        validators::validate_not_empty(&self.logging.level, "logging.level")?;
        Ok(())
    }
}
