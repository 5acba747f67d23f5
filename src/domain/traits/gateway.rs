use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::errors::BotError;
use crate::domain::entities::{CommandSpec, Community, InteractionRef};

/// Gateway trait - abstraction over the messaging platform connection
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send the initial response to an interaction
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: InteractionResponse,
    ) -> Result<Option<SentMessage>, BotError>;

    /// Replace the content of the initial (possibly deferred) response
    async fn edit_reply(&self, interaction: &InteractionRef, content: &str) -> Result<(), BotError>;

    /// Send an additional message after the initial response
    async fn follow_up(&self, interaction: &InteractionRef, reply: &Reply) -> Result<SentMessage, BotError>;

    /// Post a plain message into a channel
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<SentMessage, BotError>;

    /// Publish the command set, returning how many commands the platform accepted
    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<usize, BotError>;

    /// Live snapshot of every joined community
    async fn communities(&self) -> Vec<Community>;

    async fn community_count(&self) -> usize {
        self.communities().await.len()
    }

    /// Identity of the connected bot, if the connection is ready
    fn bot_info(&self) -> Option<BotInfo>;

    /// Last measured heartbeat round trip
    fn latency(&self) -> Option<Duration>;
}

/// Message content sent back to the invoker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Visible to the invoker only
    pub ephemeral: bool,
}

impl Reply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Initial interaction response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionResponse {
    Message(Reply),
    /// "Bot is thinking..." acknowledgment, to be edited later
    Deferred { ephemeral: bool },
}

/// A message the platform accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Bot information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotInfo {
    pub id: String,
    pub tag: String,
    pub application_id: Option<String>,
}
