//! Pre-dispatch credential handling

use super::error::InvalidationReason;
use super::navigator::RedirectNavigator;
use super::session::CredentialStore;
use chrono::Utc;
use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::{debug, warn};

/// Runs immediately before every outbound request
#[derive(Clone)]
pub struct RequestInterceptor {
    store: CredentialStore,
    navigator: RedirectNavigator,
}

impl RequestInterceptor {
    pub fn new(store: CredentialStore, navigator: RedirectNavigator) -> Self {
        Self { store, navigator }
    }

    /// Check expiry and attach the bearer credential
    ///
    /// An expired session is cleared and the user sent to sign-in, but the
    /// request itself still goes out, unauthenticated.
    pub fn prepare(&self, request: &mut Request) {
        if self.store.is_expired(Utc::now()) {
            invalidate(&self.store, &self.navigator, InvalidationReason::Expired);
        }

        if let Some(token) = self.store.access_token() {
            set_bearer(request, &token);
        }
    }
}

/// Set `Authorization: Bearer <token>`, replacing any existing value
pub(crate) fn set_bearer(request: &mut Request, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(_) => warn!("Access token contains invalid header characters; not attached"),
    }
}

/// The token carried in `Authorization: Bearer <token>`, if any
pub(crate) fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Drop the session and send the user to sign-in
pub(crate) fn invalidate(
    store: &CredentialStore,
    navigator: &RedirectNavigator,
    reason: InvalidationReason,
) {
    warn!(reason = %reason, "Invalidating session");
    if let Err(e) = store.clear() {
        warn!(error = %e, "Failed to clear session store");
    }
    if !navigator.go_to_sign_in() {
        debug!("Already on sign-in view");
    }
}
