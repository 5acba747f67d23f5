//! Command dispatcher - routes invocations to registered commands

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;

use super::responder::Responder;
use crate::application::errors::CommandError;
use crate::application::services::UsageLog;
use crate::domain::entities::{CommandRegistry, Invocation, UsageEntry};
use crate::domain::traits::{CommandContext, Gateway, Reply};

/// Shown to the invoker whenever a handler fails; details stay in the server log.
pub const FAILURE_NOTICE: &str = "🦈 The shark encountered a problem with this command!";

/// What happened to a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No such command here; another process may own it.
    Ignored,
    Completed,
    Failed,
}

/// Looks commands up, records usage, runs handlers and contains their failures
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
    usage: Arc<UsageLog>,
    owner_id: Option<String>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>, usage: Arc<UsageLog>, owner_id: Option<String>) -> Self {
        Self {
            registry,
            usage,
            owner_id,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, invocation: Invocation, gateway: Arc<dyn Gateway>) -> DispatchOutcome {
        let Some(command) = self.registry.get(&invocation.command_name) else {
            tracing::debug!("Ignoring unregistered command /{}", invocation.command_name);
            return DispatchOutcome::Ignored;
        };

        self.usage.record(UsageEntry::from_invocation(&invocation, Utc::now()));
        tracing::info!(
            "[COMMAND] {} ({}) used /{} in {}",
            invocation.user.tag(),
            invocation.user.id,
            invocation.command_name,
            invocation.origin_label()
        );

        let responder = Responder::new(gateway.clone(), invocation.interaction.clone());
        let ctx = CommandContext {
            invocation: &invocation,
            responder: &responder,
            gateway: gateway.as_ref(),
            owner_id: self.owner_id.as_deref(),
        };

        let result = match AssertUnwindSafe(command.execute(&ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(CommandError::Panicked(panic_message(panic.as_ref()))),
        };

        match result {
            Ok(()) => DispatchOutcome::Completed,
            Err(err) => {
                tracing::error!(
                    "Error executing command /{} for {}: {}",
                    invocation.command_name,
                    invocation.user.id,
                    err
                );
                self.send_failure_notice(&responder).await;
                DispatchOutcome::Failed
            }
        }
    }

    async fn send_failure_notice(&self, responder: &Responder) {
        let notice = Reply::ephemeral(FAILURE_NOTICE);
        let sent = if responder.has_responded() {
            responder.follow_up(notice).await.map(|_| ())
        } else {
            responder.reply(notice).await.map(|_| ())
        };
        if let Err(e) = sent {
            tracing::warn!("Could not deliver failure notice: {}", e);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{CommandSpec, InteractionRef, User};
    use crate::domain::traits::SlashCommand;
    use crate::infrastructure::adapters::console::{ConsoleGateway, Outgoing};
    use async_trait::async_trait;

    enum Behavior {
        Succeed,
        FailBeforeReply,
        FailAfterDefer,
        Panic,
    }

    struct Scripted(&'static str, Behavior);

    #[async_trait]
    impl SlashCommand for Scripted {
        fn spec(&self) -> CommandSpec {
            CommandSpec::new(self.0, "scripted")
        }

        async fn execute(&self, ctx: &CommandContext<'_>) -> Result<(), CommandError> {
            match self.1 {
                Behavior::Succeed => {
                    ctx.responder.reply(Reply::new("ok")).await?;
                    Ok(())
                }
                Behavior::FailBeforeReply => Err(CommandError::ExecutionFailed("boom".into())),
                Behavior::FailAfterDefer => {
                    ctx.responder.defer(true).await?;
                    Err(CommandError::ExecutionFailed("boom after defer".into()))
                }
                Behavior::Panic => panic!("handler exploded"),
            }
        }
    }

    fn dispatcher() -> (CommandDispatcher, Arc<UsageLog>) {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Scripted("good", Behavior::Succeed))).unwrap();
        registry.register(Arc::new(Scripted("bad", Behavior::FailBeforeReply))).unwrap();
        registry.register(Arc::new(Scripted("late", Behavior::FailAfterDefer))).unwrap();
        registry.register(Arc::new(Scripted("panics", Behavior::Panic))).unwrap();
        let usage = Arc::new(UsageLog::new());
        (
            CommandDispatcher::new(Arc::new(registry), usage.clone(), Some("owner".into())),
            usage,
        )
    }

    fn invocation(name: &str) -> Invocation {
        let interaction = InteractionRef {
            id: "175928847299117063".into(),
            token: "tok".into(),
            application_id: "app".into(),
        };
        Invocation::new(interaction, name, User::new("7", "finn"))
            .in_guild("1", Some("Reef".into()))
            .in_channel("100")
    }

    #[tokio::test]
    async fn test_unknown_command_is_silently_ignored() {
        let (dispatcher, usage) = dispatcher();
        let gateway = Arc::new(ConsoleGateway::new());
        let outcome = dispatcher.dispatch(invocation("nope"), gateway.clone()).await;
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(usage.is_empty());
        assert!(gateway.outgoing().is_empty());
    }

    #[tokio::test]
    async fn test_success_records_usage() {
        let (dispatcher, usage) = dispatcher();
        let gateway = Arc::new(ConsoleGateway::new());
        let outcome = dispatcher.dispatch(invocation("good"), gateway.clone()).await;
        assert_eq!(outcome, DispatchOutcome::Completed);

        let entries = usage.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command_name, "good");
        assert_eq!(entries[0].user_id, "7");
        assert_eq!(entries[0].username, "finn");
        assert_eq!(entries[0].guild_name.as_deref(), Some("Reef"));
        assert_eq!(gateway.outgoing().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_before_reply_sends_one_reply_notice() {
        let (dispatcher, usage) = dispatcher();
        let gateway = Arc::new(ConsoleGateway::new());
        let outcome = dispatcher.dispatch(invocation("bad"), gateway.clone()).await;
        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(usage.len(), 1, "usage is recorded before the handler runs");

        let outgoing = gateway.outgoing();
        assert_eq!(outgoing.len(), 1);
        match &outgoing[0] {
            Outgoing::Reply { content, ephemeral, .. } => {
                assert_eq!(content, FAILURE_NOTICE);
                assert!(ephemeral);
            }
            other => panic!("expected reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_after_defer_uses_follow_up() {
        let (dispatcher, _usage) = dispatcher();
        let gateway = Arc::new(ConsoleGateway::new());
        let outcome = dispatcher.dispatch(invocation("late"), gateway.clone()).await;
        assert_eq!(outcome, DispatchOutcome::Failed);

        let notices: Vec<_> = gateway
            .outgoing()
            .into_iter()
            .filter(|o| matches!(o, Outgoing::FollowUp { content, .. } | Outgoing::Reply { content, .. } if content == FAILURE_NOTICE))
            .collect();
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0], Outgoing::FollowUp { ephemeral: true, .. }));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let (dispatcher, usage) = dispatcher();
        let gateway = Arc::new(ConsoleGateway::new());
        let outcome = dispatcher.dispatch(invocation("panics"), gateway.clone()).await;
        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(usage.len(), 1);
        assert_eq!(gateway.outgoing().len(), 1);
    }
}
