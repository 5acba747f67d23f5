use async_trait::async_trait;

use super::{require_owner, required_string};
use crate::application::errors::CommandError;
use crate::domain::entities::{CommandSpec, OptionKind};
use crate::domain::traits::{CommandContext, Reply, SlashCommand};

/// `/say` - owner-only post into one channel, the current one by default
pub struct Say;

#[async_trait]
impl SlashCommand for Say {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("say", "🦈 Make the shark speak (Owner only)")
            .with_option(OptionKind::String, "message", "What should the shark say?", true)
            .with_option(
                OptionKind::Channel,
                "channel",
                "Which channel to send the message to (optional)",
                false,
            )
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<(), CommandError> {
        if !require_owner(ctx).await? {
            return Ok(());
        }

        let message = required_string(ctx, "message")?;
        let target = ctx
            .invocation
            .string_option("channel")
            .or(ctx.invocation.channel_id.as_deref())
            .ok_or_else(|| CommandError::InvalidArgs("no channel to send to".to_string()))?;

        let report = match ctx.gateway.send_message(target, message).await {
            Ok(_) => format!("🦈 Message sent to <#{}>!", target),
            Err(e) => {
                tracing::warn!("/say to channel {} failed: {}", target, e);
                format!("🦈 Failed to send message: {}", e)
            }
        };
        ctx.responder.reply(Reply::ephemeral(report)).await?;
        Ok(())
    }
}
