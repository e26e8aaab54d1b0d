//! Redirects between the sign-in view and the dashboard

use super::session::CredentialStore;
use chrono::Utc;
use shopdesk_core::RoutesConfig;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Where the application currently is, and how to move it
pub trait Location: Send + Sync {
    /// Path of the current view
    fn current_path(&self) -> String;

    /// Full-page navigation to `path`
    fn assign(&self, path: &str);
}

/// Location kept in memory, recording every navigation
#[derive(Debug, Default)]
pub struct InMemoryLocation {
    state: Mutex<LocationState>,
}

#[derive(Debug, Default)]
struct LocationState {
    current: String,
    history: Vec<String>,
}

impl InMemoryLocation {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(LocationState {
                current: initial_path.into(),
                history: Vec::new(),
            }),
        }
    }

    /// Every path navigated to, oldest first
    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }
}

impl Location for InMemoryLocation {
    fn current_path(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    fn assign(&self, path: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.current = path.to_string();
        state.history.push(path.to_string());
    }
}

/// The two views this client navigates to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRoutes {
    pub sign_in: String,
    pub dashboard: String,
}

impl Default for NavigationRoutes {
    fn default() -> Self {
        RoutesConfig::default().into()
    }
}

impl From<RoutesConfig> for NavigationRoutes {
    fn from(config: RoutesConfig) -> Self {
        Self {
            sign_in: config.sign_in,
            dashboard: config.dashboard,
        }
    }
}

/// Result of the entry check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Valid session on the sign-in view; moved to the dashboard
    SentToDashboard,
    /// Invalid or expired session; store cleared and moved to sign-in
    SentToSignIn,
    /// Invalid session while already on sign-in; store cleared, no navigation
    SignedOut,
    /// Valid session away from the sign-in view; nothing to do
    Stayed,
}

/// Decides between the sign-in view and the dashboard
#[derive(Clone)]
pub struct RedirectNavigator {
    location: Arc<dyn Location>,
    store: CredentialStore,
    routes: NavigationRoutes,
}

impl RedirectNavigator {
    pub fn new(
        location: Arc<dyn Location>,
        store: CredentialStore,
        routes: NavigationRoutes,
    ) -> Self {
        Self {
            location,
            store,
            routes,
        }
    }

    pub fn routes(&self) -> &NavigationRoutes {
        &self.routes
    }

    /// Navigate to sign-in unless already there; returns whether it moved
    pub fn go_to_sign_in(&self) -> bool {
        self.go_to(&self.routes.sign_in)
    }

    /// Navigate to the dashboard unless already there; returns whether it moved
    pub fn go_to_dashboard(&self) -> bool {
        self.go_to(&self.routes.dashboard)
    }

    fn go_to(&self, target: &str) -> bool {
        if self.location.current_path() == target {
            debug!(target_path = %target, "Already at navigation target");
            return false;
        }
        info!(target_path = %target, "Navigating");
        self.location.assign(target);
        true
    }

    /// Route the user at application entry based on session validity
    pub fn check_entry(&self, current_path: &str) -> EntryOutcome {
        let on_sign_in = current_path == self.routes.sign_in;

        if self.store.has_valid_session(Utc::now()) {
            if on_sign_in {
                self.location.assign(&self.routes.dashboard);
                info!(target_path = %self.routes.dashboard, "Valid session on sign-in view");
                return EntryOutcome::SentToDashboard;
            }
            return EntryOutcome::Stayed;
        }

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear session store");
        }
        if on_sign_in {
            EntryOutcome::SignedOut
        } else {
            self.location.assign(&self.routes.sign_in);
            info!(target_path = %self.routes.sign_in, "No valid session at entry");
            EntryOutcome::SentToSignIn
        }
    }
}
