//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Adapters: Platform integrations (Discord, console)
//! - Web: Dashboard and JSON API

pub mod adapters;
pub mod config;
pub mod web;
