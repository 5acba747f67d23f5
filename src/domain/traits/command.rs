use async_trait::async_trait;

use crate::application::errors::CommandError;
use crate::application::messaging::Responder;
use crate::domain::entities::{CommandSpec, Invocation};
use crate::domain::traits::Gateway;

/// Everything a command handler gets to work with
pub struct CommandContext<'a> {
    pub invocation: &'a Invocation,
    pub responder: &'a Responder,
    pub gateway: &'a dyn Gateway,
    pub owner_id: Option<&'a str>,
}

impl CommandContext<'_> {
    /// Plain equality against the configured owner id
    pub fn invoked_by_owner(&self) -> bool {
        self.owner_id == Some(self.invocation.user.id.as_str())
    }
}

/// A slash command compiled into the bot
#[async_trait]
pub trait SlashCommand: Send + Sync {
    fn spec(&self) -> CommandSpec;

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<(), CommandError>;
}
