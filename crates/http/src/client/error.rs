//! Client error types

use thiserror::Error;

/// Message fragment that marks a request sent without any credential.
/// Refreshing cannot fix this, so it bypasses the refresh protocol.
const TOKEN_REQUIRED_MARKER: &str = "access token is required";

/// Client error types
///
/// Anything other than the authentication-specific cases handled by the
/// refresh coordinator reaches the caller unchanged.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The shared token refresh failed; the session has been discarded
    #[error("Session refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    /// Session storage could not be read or written
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            Self::ServerError { status, .. } => Some(*status),
            Self::AuthenticationFailed(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Forbidden(_) => Some(403),
            _ => None,
        }
    }

    /// Response body or transport message
    pub fn message(&self) -> String {
        match self {
            Self::ServerError { message, .. }
            | Self::AuthenticationFailed(message)
            | Self::NotFound(message)
            | Self::BadRequest(message)
            | Self::Forbidden(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the server reports that no access token was sent at all
    pub fn requires_token(&self) -> bool {
        self.message()
            .to_lowercase()
            .contains(TOKEN_REQUIRED_MARKER)
    }

    /// Whether this is a 401 response
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Failure of the refresh-token call
///
/// Cloned to every request waiting on the same refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-2xx status
    #[error("refresh endpoint returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The refresh call never produced a response
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The response body was not a usable token payload
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// The new tokens could not be persisted
    #[error("failed to persist refreshed session: {0}")]
    Storage(String),
}

/// Session storage failure
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Why a session was invalidated locally
///
/// These failures are handled inside the client (store cleared, sign-in
/// redirect) instead of being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The stored expiry instant is in the past
    Expired,
    /// A 401 arrived but no refresh token is stored
    MissingRefreshToken,
    /// The server reports that no token was sent
    TokenRequired,
    /// The refresh call itself failed
    RefreshFailed,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::MissingRefreshToken => "missing_refresh_token",
            Self::TokenRequired => "token_required",
            Self::RefreshFailed => "refresh_failed",
        }
    }
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
