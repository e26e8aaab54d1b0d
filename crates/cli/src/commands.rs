//! CLI commands

use anyhow::{Context, Result, anyhow, bail};
use clap::Subcommand;
use reqwest::Method;
use serde_json::Value;
use shopdesk_core::ShopdeskConfig;
use shopdesk_http::client::{
    EntryOutcome, FileStorage, InMemoryLocation, Location, Session, ShopdeskClient,
    session::parse_expiry,
};
use std::sync::Arc;
use tracing::info;

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Check the stored session the way the app does at entry
    Status {
        /// Path the app is entered at
        #[arg(long, default_value = "/")]
        path: String,
    },

    /// Store a session obtained from the sign-in endpoint
    SignIn {
        #[arg(long, env = "SHOPDESK_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        #[arg(long, env = "SHOPDESK_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: Option<String>,

        /// Epoch milliseconds or a date-time such as 2025-01-01T00:00:00Z
        #[arg(long)]
        expires_at: Option<String>,
    },

    /// Discard the stored session
    SignOut,

    /// GET a path and print the JSON response
    Get { path: String },

    /// Send an arbitrary request and print the JSON response
    Request {
        /// HTTP method, e.g. POST
        method: String,

        /// Path relative to the API base URL
        path: String,

        /// JSON request body
        #[arg(long)]
        json: Option<String>,
    },

    /// Configuration operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
}

impl Commands {
    pub async fn execute(self, config: &ShopdeskConfig) -> Result<()> {
        match self {
            Commands::Status { path } => {
                let summary = status(config, &path)?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(())
            }
            Commands::SignIn {
                access_token,
                refresh_token,
                expires_at,
            } => {
                let opened = open_client(config, &config.routes.sign_in)?;
                let mut session = Session::new(access_token);
                if let Some(refresh_token) = refresh_token {
                    session = session.with_refresh_token(refresh_token);
                }
                if let Some(raw) = expires_at {
                    let at = parse_expiry(&raw)
                        .ok_or_else(|| anyhow!("unrecognized expiry '{raw}'"))?;
                    session = session.with_expires_at(at);
                }
                opened.client.sign_in(&session)?;
                info!(path = %opened.storage.path().display(), "Session stored");
                Ok(())
            }
            Commands::SignOut => {
                open_client(config, &config.routes.dashboard)?
                    .client
                    .sign_out()?;
                Ok(())
            }
            Commands::Get { path } => send(config, Method::GET, &path, None).await,
            Commands::Request { method, path, json } => {
                let method: Method = method
                    .to_uppercase()
                    .parse()
                    .with_context(|| format!("invalid HTTP method '{method}'"))?;
                let body = json
                    .map(|raw| serde_json::from_str::<Value>(&raw))
                    .transpose()
                    .context("--json is not valid JSON")?;
                send(config, method, &path, body).await
            }
            Commands::Config { command } => match command {
                ConfigCommands::Show => {
                    println!("{}", config::render(config)?);
                    Ok(())
                }
            },
        }
    }
}

struct OpenedClient {
    client: ShopdeskClient,
    location: Arc<InMemoryLocation>,
    storage: Arc<FileStorage>,
}

fn open_client(config: &ShopdeskConfig, current_path: &str) -> Result<OpenedClient> {
    let storage_path = config.session.storage_path();
    let storage = Arc::new(
        FileStorage::open(&storage_path)
            .with_context(|| format!("opening session file {}", storage_path.display()))?,
    );
    let location = Arc::new(InMemoryLocation::new(current_path));
    let client = ShopdeskClient::from_config(config, storage.clone(), location.clone())?;
    Ok(OpenedClient {
        client,
        location,
        storage,
    })
}

/// Run the entry check at `path` and describe the stored session
fn status(config: &ShopdeskConfig, path: &str) -> Result<Value> {
    let opened = open_client(config, path)?;
    let outcome = opened.client.check_entry(path);
    let session = opened.client.store().get();
    Ok(serde_json::json!({
        "outcome": outcome_name(outcome),
        "location": opened.location.current_path(),
        "signed_in": session.is_some(),
        "expires_at": session
            .as_ref()
            .and_then(|s| s.expires_at)
            .map(|at| at.to_rfc3339()),
        "has_refresh_token": session
            .as_ref()
            .is_some_and(|s| s.refresh_token.is_some()),
    }))
}

async fn send(
    config: &ShopdeskConfig,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<()> {
    if !path.starts_with('/') {
        bail!("path must start with '/'");
    }

    let OpenedClient {
        client, location, ..
    } = open_client(config, &config.routes.dashboard)?;
    let mut request = client.request(method, path);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let result = client.execute::<Value>(request).await;
    for target in location.history() {
        eprintln!("navigated to {target}");
    }

    let response = result?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn outcome_name(outcome: EntryOutcome) -> &'static str {
    match outcome {
        EntryOutcome::SentToDashboard => "sent_to_dashboard",
        EntryOutcome::SentToSignIn => "sent_to_sign_in",
        EntryOutcome::SignedOut => "signed_out",
        EntryOutcome::Stayed => "stayed",
    }
}
