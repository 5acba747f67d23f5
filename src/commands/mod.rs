//! Built-in slash commands
//!
//! The command set is fixed at compile time; `builtin_registry` assembles it
//! once at startup.

pub mod globalsay;
pub mod ping;
pub mod say;

use std::sync::Arc;

use crate::application::errors::{CommandError, RegistryError};
use crate::domain::entities::CommandRegistry;
use crate::domain::traits::{CommandContext, Reply, SlashCommand};

pub use globalsay::{broadcast, BroadcastReport, GlobalSay};
pub use ping::Ping;
pub use say::Say;

/// Sent to anyone but the owner who tries an owner-only command.
pub const OWNER_ONLY_NOTICE: &str = "🦈 Only the shark master can use this command!";

pub fn builtin_commands() -> Vec<Arc<dyn SlashCommand>> {
    vec![Arc::new(Ping), Arc::new(Say), Arc::new(GlobalSay)]
}

pub fn builtin_registry() -> Result<CommandRegistry, RegistryError> {
    let mut registry = CommandRegistry::new();
    for command in builtin_commands() {
        registry.register(command)?;
    }
    Ok(registry)
}

/// Answers non-owners with a rejection; `false` means the caller must stop.
pub(crate) async fn require_owner(ctx: &CommandContext<'_>) -> Result<bool, CommandError> {
    if ctx.invoked_by_owner() {
        return Ok(true);
    }
    tracing::warn!(
        "Rejected owner-only /{} from {} ({})",
        ctx.invocation.command_name,
        ctx.invocation.user.tag(),
        ctx.invocation.user.id
    );
    ctx.responder.reply(Reply::ephemeral(OWNER_ONLY_NOTICE)).await?;
    Ok(false)
}

pub(crate) fn required_string<'a>(ctx: &'a CommandContext<'_>, name: &str) -> Result<&'a str, CommandError> {
    ctx.invocation
        .string_option(name)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CommandError::InvalidArgs(format!("missing required option '{}'", name)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_has_all_commands() {
        let registry = builtin_registry().unwrap();
        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["globalsay", "ping", "say"]);
    }
}
