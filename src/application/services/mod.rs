//! Application services - in-memory state shared by the gateway and web paths

pub mod session_store;
pub mod usage_log;

pub use session_store::{spawn_sweeper, SessionStatus, SessionStore, SESSION_TTL_HOURS, SWEEP_INTERVAL};
pub use usage_log::{UsageLog, USAGE_LOG_CAPACITY};
