//! Web dashboard and JSON API
//!
//! Every API route is mounted under `/api` (what the dashboard page calls)
//! and at the bare path as well.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub use auth::Credentials;

use crate::application::errors::BotError;
use crate::application::services::{SessionStore, UsageLog};
use crate::domain::entities::CommandRegistry;
use crate::domain::traits::Gateway;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub usage: Arc<UsageLog>,
    pub registry: Arc<CommandRegistry>,
    pub gateway: Arc<dyn Gateway>,
    pub credentials: Arc<Credentials>,
    pub started_at: Instant,
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logs", get(handlers::logs))
        .route("/status", get(handlers::status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_session));

    Router::new()
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .merge(protected)
}

pub fn create_router(state: AppState) -> Router {
    let api = api_routes(&state);
    Router::new()
        .route("/", get(handlers::dashboard))
        .nest("/api", api.clone())
        .merge(api)
        .with_state(state)
}

/// Serve until `shutdown` flips to true (or its sender is dropped)
pub async fn serve(listener: TcpListener, router: Router, mut shutdown: watch::Receiver<bool>) -> Result<(), BotError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| BotError::Network(format!("web server failed: {}", e)))
}
