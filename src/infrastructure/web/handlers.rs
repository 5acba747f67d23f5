//! Request handlers for the dashboard API

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::auth::session_token;
use super::AppState;
use crate::domain::entities::UsageEntry;

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// Shown in `/status` until the gateway is ready
pub const NOT_CONNECTED: &str = "Not connected";

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Session expired")]
    SessionExpired,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = match self {
            WebError::InvalidCredentials => json!({ "success": false, "error": self.to_string() }),
            WebError::Unauthorized | WebError::SessionExpired => json!({ "error": self.to_string() }),
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login body, JSON or form-encoded. Anything unreadable counts as bad credentials.
pub struct LoginBody(pub LoginRequest);

#[async_trait]
impl<S> FromRequest<S> for LoginBody
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(body) = Form::<LoginRequest>::from_request(req, state)
                .await
                .map_err(|_| WebError::InvalidCredentials)?;
            return Ok(Self(body));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| WebError::InvalidCredentials)?;
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|_| WebError::InvalidCredentials)
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<UsageEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub bot_username: String,
    pub guilds: usize,
    /// Seconds since the process started
    pub uptime: f64,
    pub commands: usize,
}

pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

pub async fn login(State(state): State<AppState>, LoginBody(req): LoginBody) -> Result<Json<LoginResponse>, WebError> {
    if !state.credentials.verify(&req.username, &req.password) {
        tracing::warn!("Dashboard login failed for '{}'", req.username);
        return Err(WebError::InvalidCredentials);
    }

    let token = state.sessions.create(&req.username);
    tracing::info!("Dashboard login for '{}'", req.username);
    Ok(Json(LoginResponse { success: true, token }))
}

/// Always succeeds, whether or not the token was live
pub async fn logout(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Json<LogoutResponse> {
    if let Some(token) = session_token(&headers, &uri) {
        state.sessions.destroy(&token);
    }
    Json(LogoutResponse { success: true })
}

pub async fn logs(State(state): State<AppState>) -> Json<LogsResponse> {
    Json(LogsResponse {
        logs: state.usage.snapshot(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let bot_username = state
        .gateway
        .bot_info()
        .map(|info| info.tag)
        .unwrap_or_else(|| NOT_CONNECTED.to_string());

    Json(StatusResponse {
        bot_username,
        guilds: state.gateway.community_count().await,
        uptime: state.started_at.elapsed().as_secs_f64(),
        commands: state.registry.len(),
    })
}
