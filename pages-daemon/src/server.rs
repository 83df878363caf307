//! HTTP listener for push webhooks.
//!
//! `POST /` accepts a provider payload. Anything that is not a usable push
//! notification gets `400`; a valid one gets `202` immediately and every
//! matching builder runs in its own background task. `GET /healthz` answers
//! `ok` for liveness checks.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde_json::Value;

use pages_build::{launch_builder, BuildError, LockTable};
use pages_core::{BranchName, BuildEvent, BuilderConfig, ServerConfig, WebhookType};

use crate::dispatch::Dispatcher;
use crate::error::DaemonError;
use crate::webhooks::parse_webhook;

/// Starts one build for a dispatched event.
#[async_trait]
pub trait BuildLauncher: Send + Sync {
    async fn launch(
        &self,
        event: BuildEvent,
        branch: BranchName,
        builder: BuilderConfig,
    ) -> Result<(), BuildError>;
}

/// Launches real builds through [`launch_builder`].
pub struct SiteLauncher {
    config: Arc<ServerConfig>,
    locks: Arc<LockTable>,
}

impl SiteLauncher {
    pub fn new(config: Arc<ServerConfig>, locks: Arc<LockTable>) -> Self {
        Self { config, locks }
    }
}

#[async_trait]
impl BuildLauncher for SiteLauncher {
    async fn launch(
        &self,
        event: BuildEvent,
        branch: BranchName,
        builder: BuilderConfig,
    ) -> Result<(), BuildError> {
        launch_builder(&event, branch, &builder, &self.config, self.locks.clone()).await
    }
}

/// Shared state behind every request.
#[derive(Clone)]
pub struct AppState {
    webhook_type: WebhookType,
    dispatcher: Arc<Dispatcher>,
    launcher: Arc<dyn BuildLauncher>,
}

impl AppState {
    pub fn new(config: &ServerConfig, launcher: Arc<dyn BuildLauncher>) -> Result<Self, DaemonError> {
        Ok(Self {
            webhook_type: config.webhook_type,
            dispatcher: Arc::new(Dispatcher::new(config)?),
            launcher,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(webhook_handler))
        .route("/healthz", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Parse, dispatch and acknowledge one webhook delivery.
pub async fn webhook_handler(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting non-JSON webhook body");
            return StatusCode::BAD_REQUEST;
        }
    };
    let Some(event) = parse_webhook(state.webhook_type, &payload) else {
        tracing::debug!(webhook_type = %state.webhook_type, "rejecting invalid webhook payload");
        return StatusCode::BAD_REQUEST;
    };

    let dispatches = state.dispatcher.matches(&event);
    tracing::info!(
        collection = %event.collection,
        repo = %event.repository,
        git_ref = %event.branch,
        builders = dispatches.len(),
        "accepted webhook"
    );

    for dispatch in dispatches {
        let launcher = state.launcher.clone();
        let event = event.clone();
        tokio::spawn(async move {
            let repo = event.repository.clone();
            let branch = dispatch.branch.clone();
            match launcher.launch(event, dispatch.branch, dispatch.builder).await {
                Ok(()) => tracing::info!(repo = %repo, branch = %branch, "build finished"),
                Err(err) => {
                    tracing::error!(repo = %repo, branch = %branch, error = %err, "build failed")
                }
            }
        });
    }
    StatusCode::ACCEPTED
}
