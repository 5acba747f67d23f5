//! Discord gateway inbound loop
//!
//! One session per websocket connection; the runner reconnects with
//! exponential backoff until shutdown or a fatal close code.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::model::{GatewayPayload, InteractionPayload};
use super::{format_bot_token, DiscordClient};
use crate::application::errors::{BotError, ConfigError};
use crate::application::messaging::CommandDispatcher;
use crate::domain::traits::Gateway;

/// GUILDS | GUILD_MESSAGES
pub const INTENTS: u64 = (1 << 0) | (1 << 9);

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_HEARTBEAT_MS: u64 = 45_000;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsWrite = futures_util::stream::SplitSink<WsStream, Message>;

enum SessionEnd {
    Shutdown,
    Reconnect,
}

/// Maps a gateway close code to an error that must not be retried.
fn fatal_close(code: u16) -> Option<BotError> {
    match code {
        4004 => Some(BotError::Auth("gateway rejected the token (4004)".to_string())),
        4010 => Some(ConfigError::InvalidValue("invalid shard (4010)".to_string()).into()),
        4011 => Some(ConfigError::InvalidValue("sharding required (4011)".to_string()).into()),
        4012 => Some(ConfigError::InvalidValue("invalid gateway API version (4012)".to_string()).into()),
        4013 => Some(ConfigError::InvalidValue("invalid intents (4013)".to_string()).into()),
        4014 => Some(ConfigError::InvalidValue("disallowed intents (4014)".to_string()).into()),
        _ => None,
    }
}

fn identify_payload(token: &str, intents: u64) -> Value {
    json!({
        "op": 2,
        "d": {
            "token": format_bot_token(token),
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "shark-bot",
                "device": "shark-bot"
            }
        }
    })
}

/// Sequence tracking and round-trip measurement
#[derive(Default)]
struct Heartbeat {
    seq: AtomicU64,
    seq_set: AtomicBool,
    sent_at: std::sync::Mutex<Option<Instant>>,
}

impl Heartbeat {
    fn observe(&self, seq: u64) {
        self.seq.store(seq, Ordering::Relaxed);
        self.seq_set.store(true, Ordering::Relaxed);
    }

    fn current_seq(&self) -> Option<u64> {
        self.seq_set
            .load(Ordering::Relaxed)
            .then(|| self.seq.load(Ordering::Relaxed))
    }

    fn mark_sent(&self) {
        *self.sent_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    /// Round trip of the outstanding heartbeat, if any
    fn acknowledged(&self) -> Option<Duration> {
        self.sent_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|sent| sent.elapsed())
    }
}

/// Drives the gateway connection and hands interactions to the dispatcher
pub struct GatewayRunner {
    client: Arc<DiscordClient>,
    dispatcher: Arc<CommandDispatcher>,
    gateway_url: String,
    intents: u64,
    commands_published: AtomicBool,
}

impl GatewayRunner {
    pub fn new(client: Arc<DiscordClient>, dispatcher: Arc<CommandDispatcher>, gateway_url: impl Into<String>) -> Self {
        Self {
            client,
            dispatcher,
            gateway_url: gateway_url.into(),
            intents: INTENTS,
            commands_published: AtomicBool::new(false),
        }
    }

    /// Run until shutdown. The first connection failing, or a fatal close
    /// code at any point, ends the loop with an error.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), BotError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut connected_once = false;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match tokio_tungstenite::connect_async(self.gateway_url.as_str()).await {
                Ok((ws_stream, _)) => {
                    connected_once = true;
                    backoff = INITIAL_BACKOFF;
                    match self.run_session(ws_stream, &mut shutdown).await {
                        Ok(SessionEnd::Shutdown) => break,
                        Ok(SessionEnd::Reconnect) => info!("Reconnecting to the gateway"),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => warn!("Gateway session ended: {}", e),
                    }
                }
                Err(e) if !connected_once => {
                    return Err(BotError::Network(format!("gateway connect failed: {}", e)));
                }
                Err(e) => warn!("Gateway connect failed: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        info!("Gateway loop exited");
        Ok(())
    }

    async fn run_session(
        &self,
        ws_stream: WsStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, BotError> {
        let (write, mut read) = ws_stream.split();
        let mut session = Session {
            write: Arc::new(Mutex::new(write)),
            heartbeat: Arc::new(Heartbeat::default()),
            heartbeat_task: None,
            identified: false,
        };

        let result = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = session.write.lock().await.send(Message::Close(None)).await;
                        break Ok(SessionEnd::Shutdown);
                    }
                }
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.map(|f| u16::from(f.code));
                            warn!("Gateway closed the connection (code {:?})", code);
                            match code.and_then(fatal_close) {
                                Some(err) => break Err(err),
                                None => break Ok(SessionEnd::Reconnect),
                            }
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => break Err(BotError::Gateway(format!("gateway read failed: {}", e))),
                        None => break Ok(SessionEnd::Reconnect),
                    };

                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(payload) => payload,
                        Err(e) => {
                            debug!("Gateway payload parse error: {}", e);
                            continue;
                        }
                    };

                    match self.handle_payload(&mut session, payload).await {
                        Ok(Some(end)) => break Ok(end),
                        Ok(None) => {}
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        if let Some(task) = session.heartbeat_task.take() {
            task.abort();
        }
        result
    }

    async fn handle_payload(&self, session: &mut Session, payload: GatewayPayload) -> Result<Option<SessionEnd>, BotError> {
        if let Some(seq) = payload.s {
            session.heartbeat.observe(seq);
        }

        match payload.op {
            10 => {
                let interval = payload
                    .d
                    .as_ref()
                    .and_then(|d| d.get("heartbeat_interval"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(DEFAULT_HEARTBEAT_MS);
                if session.heartbeat_task.is_none() {
                    session.heartbeat_task = Some(session.spawn_heartbeat(Duration::from_millis(interval)));
                }
                if !session.identified {
                    session
                        .send_json(&identify_payload(self.client.token(), self.intents))
                        .await?;
                    session.identified = true;
                }
            }
            0 => {
                if let (Some(event), Some(data)) = (payload.t, payload.d) {
                    self.handle_dispatch(&event, data);
                }
            }
            1 => session.send_heartbeat().await?,
            7 => {
                warn!("Gateway requested reconnect");
                return Ok(Some(SessionEnd::Reconnect));
            }
            9 => {
                warn!("Gateway invalidated the session, identifying again");
                let wait = Duration::from_millis(rand::thread_rng().gen_range(1_000..=5_000));
                tokio::time::sleep(wait).await;
                session
                    .send_json(&identify_payload(self.client.token(), self.intents))
                    .await?;
            }
            11 => {
                if let Some(latency) = session.heartbeat.acknowledged() {
                    self.client.cache().set_latency(latency);
                }
            }
            other => debug!("Ignoring gateway opcode {}", other),
        }
        Ok(None)
    }

    fn handle_dispatch(&self, event: &str, data: Value) {
        let cache = self.client.cache();
        match event {
            "READY" => {
                cache.apply_event(event, data);
                if let Some(user) = cache.current_user() {
                    info!("🦈 Shark Bot is swimming! Logged in as {}", user.tag());
                }
                info!("🦈 Watching over {} ocean(s)", cache.guild_count());
                if !self.commands_published.swap(true, Ordering::SeqCst) {
                    self.publish_commands();
                }
            }
            "INTERACTION_CREATE" => {
                let payload: InteractionPayload = match serde_json::from_value(data) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to parse interaction: {}", e);
                        return;
                    }
                };
                let guild_name = payload.guild_id.as_deref().and_then(|id| cache.guild_name(id));
                let Some(invocation) = payload.into_invocation(guild_name) else {
                    return;
                };

                let dispatcher = self.dispatcher.clone();
                let gateway: Arc<dyn Gateway> = self.client.clone();
                tokio::spawn(async move {
                    dispatcher.dispatch(invocation, gateway).await;
                });
            }
            _ => {
                cache.apply_event(event, data);
            }
        }
    }

    fn publish_commands(&self) {
        let client = self.client.clone();
        let specs = self.dispatcher.registry().specs();
        tokio::spawn(async move {
            info!("Started refreshing {} application (/) commands.", specs.len());
            match client.register_commands(&specs).await {
                Ok(count) => info!("Successfully reloaded {} application (/) commands.", count),
                Err(e) => error!("Failed to register commands: {}", e),
            }
        });
    }
}

struct Session {
    write: Arc<Mutex<WsWrite>>,
    heartbeat: Arc<Heartbeat>,
    heartbeat_task: Option<JoinHandle<()>>,
    identified: bool,
}

impl Session {
    fn spawn_heartbeat(&self, interval: Duration) -> JoinHandle<()> {
        let write = self.write.clone();
        let heartbeat = self.heartbeat.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = send_heartbeat(&write, &heartbeat).await {
                    debug!("Heartbeat task stopping: {}", e);
                    break;
                }
            }
        })
    }

    async fn send_heartbeat(&self) -> Result<(), BotError> {
        send_heartbeat(&self.write, &self.heartbeat).await
    }

    async fn send_json(&self, payload: &Value) -> Result<(), BotError> {
        send_json(&self.write, payload).await
    }
}

async fn send_heartbeat(write: &Mutex<WsWrite>, heartbeat: &Heartbeat) -> Result<(), BotError> {
    let payload = json!({ "op": 1, "d": heartbeat.current_seq() });
    send_json(write, &payload).await?;
    heartbeat.mark_sent();
    Ok(())
}

async fn send_json(write: &Mutex<WsWrite>, payload: &Value) -> Result<(), BotError> {
    let text = serde_json::to_string(payload).map_err(|e| BotError::Parse(e.to_string()))?;
    write
        .lock()
        .await
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| BotError::Gateway(format!("gateway write failed: {}", e)))
}
