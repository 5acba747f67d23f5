use chrono::{DateTime, Duration, Utc};

/// A dashboard login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(username: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            created_at,
        }
    }

    /// Expired strictly after `ttl` has elapsed; at exactly `ttl` it is still valid.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}
