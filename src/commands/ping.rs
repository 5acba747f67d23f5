use async_trait::async_trait;

use crate::application::errors::CommandError;
use crate::domain::entities::CommandSpec;
use crate::domain::traits::{CommandContext, Reply, SlashCommand};

/// `/ping` - reply round trip and heartbeat latency
pub struct Ping;

#[async_trait]
impl SlashCommand for Ping {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("ping", "🦈 Check if the shark is awake!")
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<(), CommandError> {
        let sent = ctx.responder.reply(Reply::new("🦈 Swimming...")).await?;

        let response_ms = (sent.created_at - ctx.invocation.created_at).num_milliseconds();
        let heartbeat = ctx
            .gateway
            .latency()
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "n/a".to_string());

        ctx.responder
            .edit_reply(&format!(
                "🦈 **Shark Sonar Active!**\n📡 Response Time: {}ms\n💓 Heartbeat: {}",
                response_ms, heartbeat
            ))
            .await?;
        Ok(())
    }
}
