//! Discord adapter
//!
//! REST calls go through [`DiscordClient`]; inbound events arrive over the
//! websocket loop in [`gateway`], which keeps the shared [`GatewayCache`]
//! current.

pub mod cache;
pub mod gateway;
pub mod model;
pub mod permissions;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};

pub use cache::GatewayCache;
pub use gateway::{GatewayRunner, INTENTS};

use crate::application::errors::BotError;
use crate::domain::entities::{CommandSpec, Community, InteractionRef, User};
use crate::domain::traits::{BotInfo, Gateway, InteractionResponse, Reply, SentMessage};
use crate::infrastructure::config::DiscordConfig;

/// Interaction callback: respond with a message
const CALLBACK_CHANNEL_MESSAGE: u8 = 4;
/// Interaction callback: acknowledge now, edit later
const CALLBACK_DEFERRED_MESSAGE: u8 = 5;
/// Message flag: only the invoker sees it
const FLAG_EPHEMERAL: u64 = 1 << 6;

/// Discord REST client and [`Gateway`] implementation
pub struct DiscordClient {
    http: Client,
    token: String,
    api_base: String,
    client_id: Option<String>,
    cache: Arc<GatewayCache>,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, config: &DiscordConfig) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            cache: Arc::new(GatewayCache::new()),
        }
    }

    pub fn cache(&self) -> &Arc<GatewayCache> {
        &self.cache
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// Configured client id, else the one learned from READY
    fn application_id(&self) -> Result<String, BotError> {
        self.client_id
            .clone()
            .or_else(|| self.cache.application_id())
            .ok_or_else(|| BotError::Internal("application id not known yet".to_string()))
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, BotError> {
        let mut request = self
            .http
            .request(method, self.api_url(path))
            .header(AUTHORIZATION, format_bot_token(&self.token));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| BotError::Network(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| BotError::Network(e.to_string()))?;
        let parsed = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| BotError::Parse(e.to_string()))?
        };

        if status.is_success() {
            return Ok(parsed);
        }

        let message = parsed
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        if status == StatusCode::UNAUTHORIZED {
            return Err(BotError::Auth(message));
        }
        Err(BotError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Verify the token by fetching the bot's own user
    pub async fn fetch_current_user(&self) -> Result<User, BotError> {
        let value = self.call(Method::GET, "users/@me", None).await?;
        serde_json::from_value(value).map_err(|e| BotError::Parse(e.to_string()))
    }
}

fn message_body(reply: &Reply) -> Value {
    let mut body = json!({ "content": reply.content });
    if reply.ephemeral {
        body["flags"] = json!(FLAG_EPHEMERAL);
    }
    body
}

fn sent_message(value: &Value) -> Result<SentMessage, BotError> {
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BotError::Parse("message without id".to_string()))?;
    let created_at = value
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Ok(SentMessage {
        id: id.to_string(),
        created_at,
    })
}

pub(crate) fn format_bot_token(token: &str) -> String {
    if token.trim_start().starts_with("Bot ") {
        token.to_string()
    } else {
        format!("Bot {}", token)
    }
}

#[async_trait]
impl Gateway for DiscordClient {
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: InteractionResponse,
    ) -> Result<Option<SentMessage>, BotError> {
        match response {
            InteractionResponse::Message(reply) => {
                let path = format!(
                    "interactions/{}/{}/callback?with_response=true",
                    interaction.id, interaction.token
                );
                let body = json!({ "type": CALLBACK_CHANNEL_MESSAGE, "data": message_body(&reply) });
                let value = self.call(Method::POST, &path, Some(body)).await?;
                Ok(value.pointer("/resource/message").and_then(|m| sent_message(m).ok()))
            }
            InteractionResponse::Deferred { ephemeral } => {
                let path = format!("interactions/{}/{}/callback", interaction.id, interaction.token);
                let flags = if ephemeral { FLAG_EPHEMERAL } else { 0 };
                let body = json!({ "type": CALLBACK_DEFERRED_MESSAGE, "data": { "flags": flags } });
                self.call(Method::POST, &path, Some(body)).await?;
                Ok(None)
            }
        }
    }

    async fn edit_reply(&self, interaction: &InteractionRef, content: &str) -> Result<(), BotError> {
        let path = format!(
            "webhooks/{}/{}/messages/@original",
            interaction.application_id, interaction.token
        );
        self.call(Method::PATCH, &path, Some(json!({ "content": content })))
            .await?;
        Ok(())
    }

    async fn follow_up(&self, interaction: &InteractionRef, reply: &Reply) -> Result<SentMessage, BotError> {
        let path = format!("webhooks/{}/{}?wait=true", interaction.application_id, interaction.token);
        let value = self.call(Method::POST, &path, Some(message_body(reply))).await?;
        sent_message(&value)
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<SentMessage, BotError> {
        let path = format!("channels/{}/messages", channel_id);
        let value = self
            .call(Method::POST, &path, Some(json!({ "content": content })))
            .await?;
        sent_message(&value)
    }

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<usize, BotError> {
        let path = format!("applications/{}/commands", self.application_id()?);
        let body = serde_json::to_value(commands).map_err(|e| BotError::Parse(e.to_string()))?;
        let value = self.call(Method::PUT, &path, Some(body)).await?;
        Ok(value.as_array().map(Vec::len).unwrap_or(0))
    }

    async fn communities(&self) -> Vec<Community> {
        self.cache.communities()
    }

    async fn community_count(&self) -> usize {
        self.cache.guild_count()
    }

    fn bot_info(&self) -> Option<BotInfo> {
        self.cache.current_user().map(|user| BotInfo {
            tag: user.tag(),
            id: user.id,
            application_id: self.client_id.clone().or_else(|| self.cache.application_id()),
        })
    }

    fn latency(&self) -> Option<Duration> {
        self.cache.latency()
    }
}
