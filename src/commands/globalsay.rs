use async_trait::async_trait;

use super::{require_owner, required_string};
use crate::application::errors::CommandError;
use crate::domain::entities::{CommandSpec, OptionKind};
use crate::domain::traits::{CommandContext, Gateway, SlashCommand};

/// Outcome of a broadcast across every joined community
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn summary(&self) -> String {
        format!(
            "🦈 **Global Broadcast Complete!**\n✅ Sent to {} ocean(s)\n❌ Failed in {} ocean(s)",
            self.sent, self.failed
        )
    }
}

/// Post `message` to the first postable channel of each community.
///
/// A community with no postable channel, or whose send fails, counts as a
/// failure; the loop always visits every community.
pub async fn broadcast(gateway: &dyn Gateway, message: &str) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for community in gateway.communities().await {
        let Some(destination) = community.first_postable() else {
            tracing::warn!("No postable channel in {} ({})", community.name, community.id);
            report.failed += 1;
            continue;
        };

        match gateway.send_message(&destination.id, message).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                tracing::error!("Failed to send to {}: {}", community.name, e);
                report.failed += 1;
            }
        }
    }

    report
}

/// `/globalsay` - owner-only broadcast to every joined community
pub struct GlobalSay;

#[async_trait]
impl SlashCommand for GlobalSay {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("globalsay", "🦈 Make the shark speak in ALL servers (Owner only)")
            .with_option(OptionKind::String, "message", "What should the shark say globally?", true)
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<(), CommandError> {
        if !require_owner(ctx).await? {
            return Ok(());
        }
        let message = required_string(ctx, "message")?;

        ctx.responder.defer(true).await?;
        let report = broadcast(ctx.gateway, message).await;
        tracing::info!("Global broadcast: {} sent, {} failed", report.sent, report.failed);
        ctx.responder.edit_reply(&report.summary()).await?;
        Ok(())
    }
}
