//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: Session store and usage log
//! - Errors: Domain-specific errors
//! - Messaging: Invocation parsing, dispatching and responding

pub mod errors;
pub mod messaging;
pub mod services;
