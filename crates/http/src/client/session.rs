//! Credential store for the current session

use super::error::StorageError;
use super::storage::SessionStorage;
use crate::types::RefreshTokenResponse;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;

/// Persisted key for the access token
pub const AUTH_TOKEN_KEY: &str = "auth_token";
/// Persisted key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Persisted key for the expiry (epoch milliseconds or a date-time string)
pub const EXPIRES_AT_KEY: &str = "expires_at";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// An authenticated identity
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Tokens returned by a successful refresh
///
/// `expires_at` is kept in its raw form and persisted as received.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<String>,
}

impl std::fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl From<RefreshTokenResponse> for RefreshedTokens {
    fn from(response: RefreshTokenResponse) -> Self {
        let expires_at = response.expires_at_raw();
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }
}

/// Parse a stored expiry value
///
/// A pure-digit string is an epoch in milliseconds; anything else is tried
/// as a date-time. Unparsable input yields `None`, meaning validity cannot
/// be proven.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Process-wide holder of the current session
///
/// Cloning is cheap; clones share the same backing storage.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn SessionStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Current session, present whenever an access token is stored
    pub fn get(&self) -> Option<Session> {
        let access_token = self.access_token()?;
        Some(Session {
            access_token,
            refresh_token: self.refresh_token(),
            expires_at: self.expiry_instant(),
        })
    }

    /// Replace the stored session
    pub fn set(&self, session: &Session) -> Result<(), StorageError> {
        self.storage
            .set_item(AUTH_TOKEN_KEY, &session.access_token)?;
        match &session.refresh_token {
            Some(token) => self.storage.set_item(REFRESH_TOKEN_KEY, token)?,
            None => self.storage.remove_item(REFRESH_TOKEN_KEY)?,
        }
        match session.expires_at {
            Some(at) => self
                .storage
                .set_item(EXPIRES_AT_KEY, &at.timestamp_millis().to_string())?,
            None => self.storage.remove_item(EXPIRES_AT_KEY)?,
        }
        Ok(())
    }

    /// Remove every persisted session field
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(AUTH_TOKEN_KEY)?;
        self.storage.remove_item(REFRESH_TOKEN_KEY)?;
        self.storage.remove_item(EXPIRES_AT_KEY)?;
        Ok(())
    }

    pub fn access_token(&self) -> Option<String> {
        non_empty(self.storage.get_item(AUTH_TOKEN_KEY))
    }

    pub fn refresh_token(&self) -> Option<String> {
        non_empty(self.storage.get_item(REFRESH_TOKEN_KEY))
    }

    /// Stored expiry, if present and parsable
    pub fn expiry_instant(&self) -> Option<DateTime<Utc>> {
        self.storage
            .get_item(EXPIRES_AT_KEY)
            .as_deref()
            .and_then(parse_expiry)
    }

    /// True only when a known expiry lies strictly before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_instant().is_some_and(|at| at < now)
    }

    /// An access token is stored and its expiry is known to be in the future
    pub fn has_valid_session(&self, now: DateTime<Utc>) -> bool {
        self.access_token().is_some() && self.expiry_instant().is_some_and(|at| at > now)
    }

    /// Persist the result of a refresh, keeping the current refresh token
    /// and expiry when the response omits them
    pub fn apply_refresh(&self, tokens: &RefreshedTokens) -> Result<(), StorageError> {
        self.storage.set_item(AUTH_TOKEN_KEY, &tokens.access_token)?;
        if let Some(refresh_token) = &tokens.refresh_token {
            self.storage.set_item(REFRESH_TOKEN_KEY, refresh_token)?;
        }
        if let Some(expires_at) = &tokens.expires_at {
            self.storage.set_item(EXPIRES_AT_KEY, expires_at)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("has_session", &self.access_token().is_some())
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
