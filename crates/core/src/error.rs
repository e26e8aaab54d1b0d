//! Errors raised while assembling the runtime configuration

use config::ConfigError;

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A source could not be read or did not deserialize
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    /// Every source loaded but the merged values are unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl CoreError {
    pub(crate) fn invalid(err: ConfigError) -> Self {
        match err {
            ConfigError::Message(message) => Self::Invalid(message),
            other => Self::Invalid(other.to_string()),
        }
    }

    /// Whether the merged configuration failed validation
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}
