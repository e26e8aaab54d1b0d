//! Shopdesk core types and utilities

pub mod config;
pub mod error;
#[cfg(feature = "tracing")]
pub mod tracing;
pub mod validation;

pub use config::{ApiConfig, LoggingConfig, RoutesConfig, SessionConfig, ShopdeskConfig};
pub use error::{CoreError, CoreResult};
pub use validation::{ValidateConfig, validators};
