//! Wire types for the authentication endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Body of `POST /api/auth/refresh-token`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Successful refresh response
///
/// Only the access token is required. A missing refresh token means the
/// current one stays valid; a missing expiry leaves the stored expiry as is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Either an epoch-millisecond number/digit string or a date-time string
    #[serde(default)]
    pub expires_at: Option<JsonValue>,
}

impl RefreshTokenResponse {
    /// Expiry rendered as the string form the credential store persists
    pub fn expires_at_raw(&self) -> Option<String> {
        match self.expires_at.as_ref()? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
