//! Dashboard authentication
//!
//! Credentials are a single configured username/password pair; a successful
//! login yields a session token which clients present on every protected
//! request, either as the `X-Session-Token` header or a `token` query
//! parameter.

use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::handlers::WebError;
use super::AppState;
use crate::application::services::SessionStatus;

pub const SESSION_HEADER: &str = "x-session-token";

/// The dashboard login
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        // Evaluate both so timing does not reveal which one was wrong.
        let user_ok = constant_time_eq(username, &self.username);
        let pass_ok = constant_time_eq(password, &self.password);
        user_ok & pass_ok
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Header first, then the `token` query parameter; blank values count as absent.
pub fn session_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(uri)
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|t| !t.is_empty())
    })
}

/// Rejects requests without an active session
pub async fn require_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let status = match session_token(request.headers(), request.uri()) {
        Some(token) => state.sessions.check(&token),
        None => SessionStatus::Unknown,
    };

    match status {
        SessionStatus::Active(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        SessionStatus::Expired => {
            tracing::debug!("Rejected expired dashboard session");
            WebError::SessionExpired.into_response()
        }
        SessionStatus::Unknown => WebError::Unauthorized.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_verify_requires_both_fields() {
        let creds = Credentials::new("admin", "changeme");
        assert!(creds.verify("admin", "changeme"));
        assert!(!creds.verify("admin", "changemf"));
        assert!(!creds.verify("admim", "changeme"));
        assert!(!creds.verify("", ""));
    }

    #[test]
    fn test_header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("from-header"));
        let uri: Uri = "/logs?token=from-query".parse().unwrap();
        assert_eq!(session_token(&headers, &uri).as_deref(), Some("from-header"));
        assert_eq!(session_token(&HeaderMap::new(), &uri).as_deref(), Some("from-query"));
    }

    #[test]
    fn test_missing_or_blank_token() {
        let uri: Uri = "/logs?token=".parse().unwrap();
        assert_eq!(session_token(&HeaderMap::new(), &uri), None);
        let uri: Uri = "/logs".parse().unwrap();
        assert_eq!(session_token(&HeaderMap::new(), &uri), None);
    }
}
