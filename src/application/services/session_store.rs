//! In-memory dashboard sessions with 24 hour expiry

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::domain::entities::Session;
use crate::domain::traits::{Clock, SystemClock};

/// Sessions live this long from login, with no renewal on activity.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Cadence of the background sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// 256 bits of OS randomness per token.
const TOKEN_BYTES: usize = 32;

/// Result of looking a token up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Active(Session),
    /// The token existed but was past its lifetime; it has now been evicted.
    Expired,
    Unknown,
}

impl SessionStatus {
    pub fn into_active(self) -> Option<Session> {
        match self {
            SessionStatus::Active(session) => Some(session),
            _ => None,
        }
    }
}

/// Token → session map, expiring lazily on lookup and eagerly on sweep
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::hours(SESSION_TTL_HOURS),
            clock,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a session for `username` and hand back its token
    pub fn create(&self, username: &str) -> String {
        let session = Session::new(username, self.clock.now());
        let mut sessions = self.sessions();
        let mut token = generate_token();
        while sessions.contains_key(&token) {
            token = generate_token();
        }
        sessions.insert(token.clone(), session);
        token
    }

    pub fn check(&self, token: &str) -> SessionStatus {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        match sessions.get(token) {
            None => SessionStatus::Unknown,
            Some(session) if session.is_expired(now, self.ttl) => {
                sessions.remove(token);
                SessionStatus::Expired
            }
            Some(session) => SessionStatus::Active(session.clone()),
        }
    }

    pub fn validate(&self, token: &str) -> Option<Session> {
        self.check(token).into_active()
    }

    pub fn destroy(&self, token: &str) {
        self.sessions().remove(token);
    }

    /// Evict every expired session, returning how many were dropped
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.ttl));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Run `sweep` on a fixed interval until the task is aborted
pub fn spawn_sweeper(store: Arc<SessionStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately; nothing can have expired yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = store.sweep();
            if evicted > 0 {
                tracing::debug!("Session sweep evicted {} expired session(s)", evicted);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::ManualClock;
    use chrono::Duration as ChronoDuration;

    fn store_with_clock() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (SessionStore::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_token_is_64_hex_chars_and_unique() {
        let store = SessionStore::new();
        let a = store.create("admin");
        let b = store.create("admin");
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_validate_returns_created_session() {
        let (store, clock) = store_with_clock();
        let token = store.create("admin");
        let session = store.validate(&token).unwrap();
        assert_eq!(session.username, "admin");
        assert_eq!(session.created_at, clock.now());
        assert!(store.validate("not-a-token").is_none());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let store = SessionStore::new();
        let token = store.create("admin");
        store.destroy(&token);
        store.destroy(&token);
        store.destroy("never-existed");
        assert!(store.validate(&token).is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let (store, clock) = store_with_clock();
        let token = store.create("admin");

        clock.advance(ChronoDuration::hours(SESSION_TTL_HOURS));
        assert!(store.validate(&token).is_some(), "exactly 24h is still valid");

        clock.advance(ChronoDuration::seconds(1));
        assert_eq!(store.check(&token), SessionStatus::Expired);
        assert!(store.is_empty(), "expired session is evicted on lookup");
    }

    #[test]
    fn test_evicted_token_stays_gone_after_rewind() {
        let (store, clock) = store_with_clock();
        let start = clock.now();
        let token = store.create("admin");

        clock.advance(ChronoDuration::hours(25));
        assert_eq!(store.check(&token), SessionStatus::Expired);

        clock.set(start);
        assert_eq!(store.check(&token), SessionStatus::Unknown);
    }

    #[test]
    fn test_no_renewal_on_activity() {
        let (store, clock) = store_with_clock();
        let token = store.create("admin");
        for _ in 0..23 {
            clock.advance(ChronoDuration::hours(1));
            assert!(store.validate(&token).is_some());
        }
        clock.advance(ChronoDuration::hours(2));
        assert!(store.validate(&token).is_none());
    }

    #[test]
    fn test_sweep_only_removes_expired() {
        let (store, clock) = store_with_clock();
        let old = store.create("admin");
        clock.advance(ChronoDuration::hours(20));
        let young = store.create("admin");
        clock.advance(ChronoDuration::hours(5));

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.validate(&young).is_some());
        assert_eq!(store.check(&old), SessionStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let (store, clock) = store_with_clock();
        let store = Arc::new(store);
        store.create("admin");
        clock.advance(ChronoDuration::hours(25));

        let handle = spawn_sweeper(store.clone(), SWEEP_INTERVAL);
        tokio::time::sleep(SWEEP_INTERVAL + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        assert!(store.is_empty());
        handle.abort();
    }
}
