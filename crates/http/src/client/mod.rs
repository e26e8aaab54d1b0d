//! Shopdesk HTTP client

pub mod context;
pub mod error;
pub mod interceptor;
pub mod navigator;
pub mod refresh;
pub mod session;
pub mod storage;

pub use context::RequestContext;
pub use error::{ClientError, InvalidationReason, RefreshError, StorageError};
pub use interceptor::RequestInterceptor;
pub use navigator::{EntryOutcome, InMemoryLocation, Location, NavigationRoutes, RedirectNavigator};
pub use refresh::{HttpTokenRefresher, Recovery, RefreshCoordinator, TokenRefresher};
pub use session::{CredentialStore, RefreshedTokens, Session};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};

use reqwest::{Client, ClientBuilder, Response};
use shopdesk_core::ShopdeskConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Authenticated API client
///
/// Clones share the credential store and the refresh coordinator, so every
/// clone takes part in the same single-flight refresh.
#[derive(Clone)]
pub struct ShopdeskClient {
    client: Client,
    base_url: String,
    store: CredentialStore,
    navigator: RedirectNavigator,
    interceptor: RequestInterceptor,
    coordinator: Arc<RefreshCoordinator>,
}

impl ShopdeskClient {
    /// Create a new client with in-memory session storage
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ShopdeskClientBuilder {
        ShopdeskClientBuilder::default()
    }

    /// Create a client from loaded configuration
    pub fn from_config(
        config: &ShopdeskConfig,
        storage: Arc<dyn SessionStorage>,
        location: Arc<dyn Location>,
    ) -> Result<Self, ClientError> {
        Self::builder()
            .base_url(&config.api.base_url)
            .timeout(config.api.timeout())
            .user_agent(&config.api.user_agent)
            .routes(config.routes.clone().into())
            .storage(storage)
            .location(location)
            .build()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn navigator(&self) -> &RedirectNavigator {
        &self.navigator
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Persist a session obtained from an explicit sign-in
    pub fn sign_in(&self, session: &Session) -> Result<(), ClientError> {
        self.store.set(session)?;
        info!(
            has_refresh_token = session.refresh_token.is_some(),
            expires_at = ?session.expires_at,
            "Signed in"
        );
        Ok(())
    }

    /// Discard the session and return to the sign-in view
    pub fn sign_out(&self) -> Result<(), ClientError> {
        self.store.clear()?;
        self.navigator.go_to_sign_in();
        info!("Signed out");
        Ok(())
    }

    /// Route the user at application entry
    pub fn check_entry(&self, current_path: &str) -> EntryOutcome {
        self.navigator.check_entry(current_path)
    }

    /// Create a request builder; credentials are attached at send time
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Send a request through the session pipeline
    ///
    /// The interceptor runs before every attempt. A failed attempt goes to
    /// the refresh coordinator, which either replays it once with a fresh
    /// token or returns the error to hand back to the caller.
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let mut context = RequestContext::new(request.build()?);
        let mut replay_token: Option<String> = None;

        loop {
            let mut attempt = context.attempt().ok_or_else(|| {
                ClientError::Configuration("request body cannot be replayed".into())
            })?;
            self.interceptor.prepare(&mut attempt);
            if let Some(token) = replay_token.as_deref() {
                interceptor::set_bearer(&mut attempt, token);
            }
            context.record_credential(interceptor::bearer_token(&attempt));

            debug!(
                method = %attempt.method(),
                path = %attempt.url().path(),
                replay = context.retried(),
                "Sending request"
            );

            let failure = match self.client.execute(attempt).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => error_from_response(response).await,
                Err(e) => ClientError::Request(e),
            };

            match self.coordinator.recover(context, failure).await {
                Recovery::Replay {
                    context: retried,
                    token,
                } => {
                    context = retried;
                    replay_token = Some(token);
                }
                Recovery::Fail(error) => return Err(error),
            }
        }
    }

    /// Send a request and decode a JSON response
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}

async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let message = response.text().await.unwrap_or_else(|_| status.to_string());
    ClientError::from_status(status, message)
}

/// Builder for ShopdeskClient
#[derive(Default)]
pub struct ShopdeskClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    routes: Option<NavigationRoutes>,
    storage: Option<Arc<dyn SessionStorage>>,
    location: Option<Arc<dyn Location>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl ShopdeskClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the sign-in and dashboard paths
    pub fn routes(mut self, routes: NavigationRoutes) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Set where the session is persisted (defaults to memory)
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the navigation target (defaults to an in-memory location at `/`)
    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    /// Replace the HTTP refresh call
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ShopdeskClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| concat!("shopdesk/", env!("CARGO_PKG_VERSION")).to_string()),
        );
        let client = client_builder.build()?;

        let store = CredentialStore::new(
            self.storage
                .unwrap_or_else(|| Arc::new(MemoryStorage::new())),
        );
        let location = self
            .location
            .unwrap_or_else(|| Arc::new(InMemoryLocation::new("/")));
        let navigator =
            RedirectNavigator::new(location, store.clone(), self.routes.unwrap_or_default());
        let refresher = self
            .refresher
            .unwrap_or_else(|| Arc::new(HttpTokenRefresher::new(client.clone(), &base_url)));

        Ok(ShopdeskClient {
            interceptor: RequestInterceptor::new(store.clone(), navigator.clone()),
            coordinator: Arc::new(RefreshCoordinator::new(
                store.clone(),
                navigator.clone(),
                refresher,
            )),
            client,
            base_url,
            store,
            navigator,
        })
    }
}
