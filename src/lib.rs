//! Shark Bot - a Discord slash-command bot with a web dashboard

pub mod application;
pub mod commands;
pub mod domain;
pub mod infrastructure;
