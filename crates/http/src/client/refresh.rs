//! Single-flight session refresh
//!
//! When a request fails with 401 the coordinator either starts the one
//! refresh call allowed at a time or queues the request behind the refresh
//! already in flight. Every queued request is settled with the outcome of
//! that same refresh, in the order it was queued.
//!
//! The state mutex is only ever held inside synchronous steps. It is never
//! held across an `.await`, so the `Idle`/`Refreshing` flag is the only
//! thing that serializes refreshes.

use super::context::RequestContext;
use super::error::{ClientError, InvalidationReason, RefreshError};
use super::interceptor::invalidate;
use super::navigator::RedirectNavigator;
use super::session::{CredentialStore, RefreshedTokens};
use crate::types::{RefreshTokenRequest, RefreshTokenResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Path of the refresh endpoint, relative to the API base URL
pub const REFRESH_TOKEN_PATH: &str = "/api/auth/refresh-token";

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError>;
}

/// Calls `POST <base>/api/auth/refresh-token`
///
/// The refresh call bypasses the interceptor: it carries no bearer header
/// and its failures are never fed back into the coordinator.
#[derive(Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_TOKEN_PATH),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RefreshTokenRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: RefreshTokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if body.access_token.is_empty() {
            return Err(RefreshError::InvalidResponse(
                "accessToken is empty".to_string(),
            ));
        }
        Ok(body.into())
    }
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

/// Waiters exist only while a refresh is in flight
enum RefreshState {
    Idle,
    Refreshing(VecDeque<Waiter>),
}

/// What to do with a failed request
#[derive(Debug)]
pub enum Recovery {
    /// Resubmit the request with this access token
    Replay {
        context: RequestContext,
        token: String,
    },
    /// Hand this error to the caller
    Fail(ClientError),
}

enum Role<'a> {
    Leader(LeaderGuard<'a>),
    Follower(oneshot::Receiver<Result<String, RefreshError>>),
}

/// Returns the coordinator to `Idle` even if the leading request is dropped
/// mid-refresh. Waiters left behind see a closed channel.
struct LeaderGuard<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self) -> VecDeque<Waiter> {
        self.settled = true;
        take_waiters(self.state)
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = take_waiters(self.state);
            warn!(waiters = abandoned.len(), "Session refresh abandoned");
        }
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take_waiters(state: &Mutex<RefreshState>) -> VecDeque<Waiter> {
    match std::mem::replace(&mut *lock(state), RefreshState::Idle) {
        RefreshState::Refreshing(waiters) => waiters,
        RefreshState::Idle => VecDeque::new(),
    }
}

/// Owns the refresh protocol for one client
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    store: CredentialStore,
    navigator: RedirectNavigator,
    refresher: Arc<dyn TokenRefresher>,
}

impl RefreshCoordinator {
    pub fn new(
        store: CredentialStore,
        navigator: RedirectNavigator,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            store,
            navigator,
            refresher,
        }
    }

    /// Whether a refresh call is in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(*lock(&self.state), RefreshState::Refreshing(_))
    }

    /// Requests queued behind the refresh in flight
    pub fn pending_waiters(&self) -> usize {
        match &*lock(&self.state) {
            RefreshState::Refreshing(waiters) => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Decide the fate of a failed request
    pub async fn recover(&self, context: RequestContext, failure: ClientError) -> Recovery {
        if failure.requires_token() {
            invalidate(&self.store, &self.navigator, InvalidationReason::TokenRequired);
            return Recovery::Fail(failure);
        }

        if !failure.is_unauthorized() || context.retried() {
            return Recovery::Fail(failure);
        }

        let context = context.into_retried();

        if let Some(token) = self.superseding_token(&context) {
            debug!("Session refreshed after this request was sent");
            return Recovery::Replay { context, token };
        }

        let Some(refresh_token) = self.store.refresh_token() else {
            invalidate(
                &self.store,
                &self.navigator,
                InvalidationReason::MissingRefreshToken,
            );
            return Recovery::Fail(failure);
        };

        match self.join_or_lead() {
            Role::Follower(outcome) => match outcome.await {
                Ok(Ok(token)) => Recovery::Replay { context, token },
                Ok(Err(e)) => Recovery::Fail(ClientError::RefreshFailed(e)),
                Err(_) => Recovery::Fail(failure),
            },
            Role::Leader(guard) => self.lead(guard, &refresh_token, context).await,
        }
    }

    /// The stored access token, when it differs from the one the request carried
    fn superseding_token(&self, context: &RequestContext) -> Option<String> {
        let sent = context.credential()?;
        self.store.access_token().filter(|current| current != sent)
    }

    fn join_or_lead(&self) -> Role<'_> {
        let mut state = lock(&self.state);
        match &mut *state {
            RefreshState::Refreshing(waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.push_back(tx);
                debug!(position = waiters.len(), "Queued behind session refresh");
                Role::Follower(rx)
            }
            RefreshState::Idle => {
                *state = RefreshState::Refreshing(VecDeque::new());
                Role::Leader(LeaderGuard {
                    state: &self.state,
                    settled: false,
                })
            }
        }
    }

    async fn lead(
        &self,
        guard: LeaderGuard<'_>,
        refresh_token: &str,
        context: RequestContext,
    ) -> Recovery {
        info!("Refreshing session");

        let result = match self.refresher.refresh(refresh_token).await {
            Ok(tokens) => self
                .store
                .apply_refresh(&tokens)
                .map(|()| tokens.access_token)
                .map_err(|e| RefreshError::Storage(e.to_string())),
            Err(e) => Err(e),
        };

        let waiters = guard.settle();

        match result {
            Ok(token) => {
                info!(waiters = waiters.len(), "Session refreshed");
                for waiter in waiters {
                    let _ = waiter.send(Ok(token.clone()));
                }
                Recovery::Replay { context, token }
            }
            Err(e) => {
                warn!(error = %e, waiters = waiters.len(), "Session refresh failed");
                for waiter in waiters {
                    let _ = waiter.send(Err(e.clone()));
                }
                invalidate(&self.store, &self.navigator, InvalidationReason::RefreshFailed);
                Recovery::Fail(ClientError::RefreshFailed(e))
            }
        }
    }
}
