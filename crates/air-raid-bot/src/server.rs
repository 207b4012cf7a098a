//! HTTP status server.

use std::io;

use alert_watch::{SubscriptionController, SubscriptionStatus, WatchError};
use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub controller: SubscriptionController,
}

impl AppState {
    pub fn new(controller: SubscriptionController) -> Self {
        Self { controller }
    }
}

/// Errors surfaced by handlers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        let body = json!({ "error": self.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// State cache dump page.
#[derive(Template)]
#[template(path = "states.html")]
pub struct StatesTemplate {
    pub dump: String,
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route("/states", get(states))
        .route("/subscriptions", get(subscriptions))
        .with_state(state)
}

/// Serve on `listener` until `shutdown` fires.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Status server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn welcome() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to server!" }))
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn states(State(state): State<AppState>) -> Result<StatesTemplate, ServerError> {
    let dump = state.controller.dump().await?;
    Ok(StatesTemplate { dump })
}

async fn subscriptions(State(state): State<AppState>) -> Json<Vec<SubscriptionStatus>> {
    Json(state.controller.subscriptions().await)
}
