//! Domain layer - Core business objects and the seams around them
//!
//! This layer contains:
//! - Entities: Invocations, users, commands, sessions, usage entries, communities
//! - Traits: Abstractions for infrastructure (Gateway, SlashCommand, Clock)

pub mod entities;
pub mod traits;
