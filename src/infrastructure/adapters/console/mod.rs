//! Console adapter for development/testing
//!
//! Implements [`Gateway`] entirely in memory: everything the bot "sends" is
//! recorded (and optionally printed), communities are whatever the caller
//! configures, and individual channels can be made to fail.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::application::errors::BotError;
use crate::application::messaging::{CommandDispatcher, CommandLineParser};
use crate::domain::entities::{CommandSpec, Community, InteractionRef, User};
use crate::domain::traits::{BotInfo, Gateway, InteractionResponse, Reply, SentMessage};

/// Something the bot sent through the console gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Reply { interaction_id: String, content: String, ephemeral: bool },
    Deferred { interaction_id: String, ephemeral: bool },
    Edit { interaction_id: String, content: String },
    FollowUp { interaction_id: String, content: String, ephemeral: bool },
    Channel { channel_id: String, content: String },
}

#[derive(Default)]
struct ConsoleState {
    outgoing: Vec<Outgoing>,
    communities: Vec<Community>,
    failing_channels: HashSet<String>,
    latency: Option<Duration>,
}

/// In-memory gateway
pub struct ConsoleGateway {
    info: BotInfo,
    state: Mutex<ConsoleState>,
    fail_responses: AtomicBool,
    echo: bool,
    next_id: AtomicU64,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                tag: "Shark Bot#0000".to_string(),
                application_id: Some("console".to_string()),
            },
            state: Mutex::new(ConsoleState::default()),
            fail_responses: AtomicBool::new(false),
            echo: false,
            next_id: AtomicU64::new(1),
        }
    }

    /// Print everything sent to stdout as well as recording it
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_communities(&self, communities: Vec<Community>) {
        self.state().communities = communities;
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Make every send to `channel_id` fail
    pub fn fail_channel(&self, channel_id: &str) {
        self.state().failing_channels.insert(channel_id.to_string());
    }

    /// Make interaction responses fail
    pub fn fail_responses(&self, fail: bool) {
        self.fail_responses.store(fail, Ordering::Relaxed);
    }

    pub fn outgoing(&self) -> Vec<Outgoing> {
        self.state().outgoing.clone()
    }

    /// `(channel_id, content)` of every plain channel message
    pub fn channel_messages(&self) -> Vec<(String, String)> {
        self.state()
            .outgoing
            .iter()
            .filter_map(|o| match o {
                Outgoing::Channel { channel_id, content } => Some((channel_id.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, outgoing: Outgoing) {
        if self.echo {
            match &outgoing {
                Outgoing::Reply { content, .. }
                | Outgoing::Edit { content, .. }
                | Outgoing::FollowUp { content, .. } => println!("[BOT] {}", content),
                Outgoing::Deferred { .. } => println!("[BOT] (thinking...)"),
                Outgoing::Channel { channel_id, content } => println!("[BOT -> #{}] {}", channel_id, content),
            }
        }
        self.state().outgoing.push(outgoing);
    }

    fn sent(&self) -> SentMessage {
        SentMessage {
            id: format!("console-msg-{}", self.next_id.fetch_add(1, Ordering::Relaxed)),
            created_at: Utc::now(),
        }
    }

    fn check_responses(&self) -> Result<(), BotError> {
        if self.fail_responses.load(Ordering::Relaxed) {
            return Err(BotError::Network("console responses disabled".to_string()));
        }
        Ok(())
    }
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for ConsoleGateway {
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: InteractionResponse,
    ) -> Result<Option<SentMessage>, BotError> {
        self.check_responses()?;
        match response {
            InteractionResponse::Message(reply) => {
                self.record(Outgoing::Reply {
                    interaction_id: interaction.id.clone(),
                    content: reply.content,
                    ephemeral: reply.ephemeral,
                });
                Ok(Some(self.sent()))
            }
            InteractionResponse::Deferred { ephemeral } => {
                self.record(Outgoing::Deferred {
                    interaction_id: interaction.id.clone(),
                    ephemeral,
                });
                Ok(None)
            }
        }
    }

    async fn edit_reply(&self, interaction: &InteractionRef, content: &str) -> Result<(), BotError> {
        self.check_responses()?;
        self.record(Outgoing::Edit {
            interaction_id: interaction.id.clone(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn follow_up(&self, interaction: &InteractionRef, reply: &Reply) -> Result<SentMessage, BotError> {
        self.check_responses()?;
        self.record(Outgoing::FollowUp {
            interaction_id: interaction.id.clone(),
            content: reply.content.clone(),
            ephemeral: reply.ephemeral,
        });
        Ok(self.sent())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<SentMessage, BotError> {
        if self.state().failing_channels.contains(channel_id) {
            return Err(BotError::Api {
                status: 403,
                message: "Missing Permissions".to_string(),
            });
        }
        self.record(Outgoing::Channel {
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        });
        Ok(self.sent())
    }

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<usize, BotError> {
        for spec in commands {
            tracing::debug!("Console command /{}", spec.name);
        }
        Ok(commands.len())
    }

    async fn communities(&self) -> Vec<Community> {
        self.state().communities.clone()
    }

    fn bot_info(&self) -> Option<BotInfo> {
        Some(self.info.clone())
    }

    fn latency(&self) -> Option<Duration> {
        self.state().latency
    }
}

/// Read command lines from stdin and dispatch them as `user` until EOF
pub async fn run_console(
    gateway: Arc<ConsoleGateway>,
    dispatcher: Arc<CommandDispatcher>,
    user: User,
) -> Result<(), BotError> {
    let parser = CommandLineParser::new("/");
    let specs = dispatcher.registry().specs();
    let registered = gateway.register_commands(&specs).await?;
    tracing::info!("Console mode: {} command(s) available as {}", registered, user.tag());

    let guild = gateway.communities().await.into_iter().next();
    let channel_id = guild
        .as_ref()
        .and_then(|g| g.destinations.first())
        .map(|d| d.id.clone())
        .unwrap_or_else(|| "console".to_string());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| BotError::Internal(format!("stdin read failed: {}", e)))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !parser.is_command(line) {
            println!("[BOT] Commands start with '/': {}", specs.iter().map(|s| format!("/{}", s.name)).collect::<Vec<_>>().join(", "));
            continue;
        }

        let guild_ref = guild.as_ref().map(|g| (g.id.as_str(), g.name.as_str()));
        match parser.parse(line, dispatcher.registry(), user.clone(), &channel_id, guild_ref) {
            Ok(invocation) => {
                let outcome = dispatcher.dispatch(invocation, gateway.clone()).await;
                tracing::debug!("Console dispatch outcome: {:?}", outcome);
            }
            Err(e) => println!("[BOT] {}", e),
        }
    }

    Ok(())
}
