//! Guild state kept current from gateway events
//!
//! Only what the bot needs: guild names, roles, channel overwrites and the
//! bot's own role list, enough to compute where it can post.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::model::{
    ChannelPayload, GuildMemberUpdate, GuildPayload, GuildRoleDelete, GuildRoleEvent, OverwritePayload, ReadyEvent,
    UnavailableGuild,
};
use super::permissions::channel_permissions;
use crate::domain::entities::{Community, Destination, Permissions, User};

/// Channel types that accept text messages: text, voice, announcement, stage
const TEXT_BASED_CHANNEL_TYPES: [u8; 4] = [0, 2, 5, 13];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteKind {
    Role,
    Member,
}

#[derive(Debug, Clone)]
pub struct Overwrite {
    pub id: String,
    pub kind: OverwriteKind,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl From<&OverwritePayload> for Overwrite {
    fn from(raw: &OverwritePayload) -> Self {
        Self {
            id: raw.id.clone(),
            kind: if raw.kind == 1 {
                OverwriteKind::Member
            } else {
                OverwriteKind::Role
            },
            allow: Permissions::parse(&raw.allow).unwrap_or_default(),
            deny: Permissions::parse(&raw.deny).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelState {
    pub id: String,
    pub name: String,
    pub kind: u8,
    pub overwrites: Vec<Overwrite>,
}

impl ChannelState {
    pub fn is_text_based(&self) -> bool {
        TEXT_BASED_CHANNEL_TYPES.contains(&self.kind)
    }
}

impl From<&ChannelPayload> for ChannelState {
    fn from(raw: &ChannelPayload) -> Self {
        Self {
            id: raw.id.clone(),
            name: raw.name.clone().unwrap_or_default(),
            kind: raw.kind,
            overwrites: raw.permission_overwrites.iter().map(Overwrite::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuildState {
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
    pub roles: HashMap<String, Permissions>,
    /// Listing order as received
    pub channels: Vec<ChannelState>,
    /// Roles held by the bot's own member
    pub member_roles: Vec<String>,
}

#[derive(Default)]
struct CacheInner {
    current_user: Option<User>,
    application_id: Option<String>,
    guilds: HashMap<String, GuildState>,
    /// Join order, for stable iteration
    guild_order: Vec<String>,
    latency: Option<Duration>,
}

impl CacheInner {
    fn current_user_id(&self) -> Option<&str> {
        self.current_user.as_ref().map(|u| u.id.as_str())
    }

    fn upsert_guild(&mut self, guild: GuildState) {
        if !self.guilds.contains_key(&guild.id) {
            self.guild_order.push(guild.id.clone());
        }
        self.guilds.insert(guild.id.clone(), guild);
    }

    fn remove_guild(&mut self, id: &str) {
        self.guilds.remove(id);
        self.guild_order.retain(|g| g != id);
    }
}

/// Shared cache; written by the gateway task, read by command handlers
#[derive(Default)]
pub struct GatewayCache {
    inner: RwLock<CacheInner>,
}

impl GatewayCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().current_user.clone()
    }

    pub fn application_id(&self) -> Option<String> {
        self.read().application_id.clone()
    }

    pub fn guild_count(&self) -> usize {
        self.read().guilds.len()
    }

    pub fn guild_name(&self, guild_id: &str) -> Option<String> {
        self.read()
            .guilds
            .get(guild_id)
            .map(|g| g.name.clone())
            .filter(|name| !name.is_empty())
    }

    pub fn latency(&self) -> Option<Duration> {
        self.read().latency
    }

    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = Some(latency);
    }

    /// Reset on READY; guilds listed there arrive later via GUILD_CREATE.
    pub fn apply_ready(&self, ready: ReadyEvent) {
        let mut inner = self.write();
        inner.guilds.clear();
        inner.guild_order.clear();
        inner.current_user = Some(ready.user);
        if let Some(app) = ready.application {
            inner.application_id = Some(app.id);
        }
        for guild in ready.guilds {
            inner.upsert_guild(GuildState {
                id: guild.id,
                ..GuildState::default()
            });
        }
    }

    /// Apply a dispatch event by name. Returns false for events the cache
    /// does not track or cannot parse.
    pub fn apply_event(&self, event: &str, data: Value) -> bool {
        match event {
            "READY" => parse(event, data).map(|ready| self.apply_ready(ready)).is_some(),
            "GUILD_CREATE" => parse(event, data).map(|g| self.guild_create(g)).is_some(),
            "GUILD_UPDATE" => parse(event, data).map(|g| self.guild_update(g)).is_some(),
            "GUILD_DELETE" => parse(event, data).map(|g| self.guild_delete(g)).is_some(),
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" => parse(event, data).map(|c| self.channel_upsert(c)).is_some(),
            "CHANNEL_DELETE" => parse(event, data).map(|c| self.channel_delete(c)).is_some(),
            "GUILD_ROLE_CREATE" | "GUILD_ROLE_UPDATE" => parse(event, data).map(|r| self.role_upsert(r)).is_some(),
            "GUILD_ROLE_DELETE" => parse(event, data).map(|r| self.role_delete(r)).is_some(),
            "GUILD_MEMBER_UPDATE" => parse(event, data).map(|m| self.member_update(m)).is_some(),
            _ => false,
        }
    }

    fn guild_create(&self, raw: GuildPayload) {
        let mut inner = self.write();
        let bot_id = inner.current_user_id().map(str::to_string);
        let member_roles = raw
            .members
            .iter()
            .find(|m| matches!((&m.user, &bot_id), (Some(user), Some(id)) if &user.id == id))
            .map(|m| m.roles.clone())
            .unwrap_or_default();

        inner.upsert_guild(GuildState {
            id: raw.id.clone(),
            name: raw.name.unwrap_or_default(),
            owner_id: raw.owner_id,
            roles: role_map(&raw.roles),
            channels: raw.channels.iter().map(ChannelState::from).collect(),
            member_roles,
        });
    }

    fn guild_update(&self, raw: GuildPayload) {
        let mut inner = self.write();
        if let Some(guild) = inner.guilds.get_mut(&raw.id) {
            if let Some(name) = raw.name {
                guild.name = name;
            }
            if raw.owner_id.is_some() {
                guild.owner_id = raw.owner_id;
            }
            if !raw.roles.is_empty() {
                guild.roles = role_map(&raw.roles);
            }
        }
    }

    fn guild_delete(&self, raw: UnavailableGuild) {
        // An outage keeps the guild; only a real removal drops it.
        if raw.unavailable == Some(true) {
            return;
        }
        self.write().remove_guild(&raw.id);
    }

    fn channel_upsert(&self, raw: ChannelPayload) {
        let Some(guild_id) = raw.guild_id.as_deref() else {
            return;
        };
        let mut inner = self.write();
        if let Some(guild) = inner.guilds.get_mut(guild_id) {
            let channel = ChannelState::from(&raw);
            match guild.channels.iter_mut().find(|c| c.id == channel.id) {
                Some(existing) => *existing = channel,
                None => guild.channels.push(channel),
            }
        }
    }

    fn channel_delete(&self, raw: ChannelPayload) {
        let Some(guild_id) = raw.guild_id.as_deref() else {
            return;
        };
        if let Some(guild) = self.write().guilds.get_mut(guild_id) {
            guild.channels.retain(|c| c.id != raw.id);
        }
    }

    fn role_upsert(&self, raw: GuildRoleEvent) {
        if let Some(guild) = self.write().guilds.get_mut(&raw.guild_id) {
            guild
                .roles
                .insert(raw.role.id, Permissions::parse(&raw.role.permissions).unwrap_or_default());
        }
    }

    fn role_delete(&self, raw: GuildRoleDelete) {
        if let Some(guild) = self.write().guilds.get_mut(&raw.guild_id) {
            guild.roles.remove(&raw.role_id);
            guild.member_roles.retain(|r| *r != raw.role_id);
        }
    }

    fn member_update(&self, raw: GuildMemberUpdate) {
        let mut inner = self.write();
        if inner.current_user_id() != Some(raw.user.id.as_str()) {
            return;
        }
        if let Some(guild) = inner.guilds.get_mut(&raw.guild_id) {
            guild.member_roles = raw.roles;
        }
    }

    /// Snapshot of every guild with the bot's effective permissions per channel
    pub fn communities(&self) -> Vec<Community> {
        let inner = self.read();
        let bot_id = inner.current_user_id().unwrap_or_default();

        inner
            .guild_order
            .iter()
            .filter_map(|id| inner.guilds.get(id))
            .map(|guild| Community {
                id: guild.id.clone(),
                name: guild.name.clone(),
                destinations: guild
                    .channels
                    .iter()
                    .map(|channel| Destination {
                        id: channel.id.clone(),
                        name: channel.name.clone(),
                        text_based: channel.is_text_based(),
                        permissions: channel_permissions(guild, channel, bot_id),
                    })
                    .collect(),
            })
            .collect()
    }
}

fn role_map(roles: &[super::model::RolePayload]) -> HashMap<String, Permissions> {
    roles
        .iter()
        .map(|r| (r.id.clone(), Permissions::parse(&r.permissions).unwrap_or_default()))
        .collect()
}

fn parse<T: DeserializeOwned>(event: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Failed to parse {} payload: {}", event, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ready(cache: &GatewayCache) {
        assert!(cache.apply_event(
            "READY",
            json!({
                "user": { "id": "bot", "username": "Shark Bot", "discriminator": "1234", "bot": true },
                "guilds": [{ "id": "g1", "unavailable": true }, { "id": "g2", "unavailable": true }],
                "application": { "id": "app" }
            })
        ));
    }

    fn guild_create(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "owner_id": "owner",
            "roles": [
                { "id": id, "permissions": "3072" },
                { "id": "muted", "permissions": "0" }
            ],
            "channels": [
                { "id": format!("{}-voice", id), "type": 2, "name": "voice", "permission_overwrites": [
                    { "id": id, "type": 0, "allow": "0", "deny": "2048" }
                ]},
                { "id": format!("{}-category", id), "type": 4, "name": "category" },
                { "id": format!("{}-general", id), "type": 0, "name": "general" }
            ],
            "members": [
                { "user": { "id": "bot", "username": "Shark Bot" }, "roles": [] }
            ]
        })
    }

    #[test]
    fn test_ready_sets_identity_and_placeholders() {
        let cache = GatewayCache::new();
        ready(&cache);
        assert_eq!(cache.current_user().unwrap().tag(), "Shark Bot#1234");
        assert_eq!(cache.application_id().as_deref(), Some("app"));
        assert_eq!(cache.guild_count(), 2);
        assert_eq!(cache.guild_name("g1"), None);
    }

    #[test]
    fn test_guild_create_fills_communities() {
        let cache = GatewayCache::new();
        ready(&cache);
        cache.apply_event("GUILD_CREATE", guild_create("g1", "Reef"));

        assert_eq!(cache.guild_name("g1").as_deref(), Some("Reef"));
        let communities = cache.communities();
        assert_eq!(communities.len(), 2);
        let reef = &communities[0];
        assert_eq!(reef.destinations.len(), 3);
        assert!(!reef.destinations[0].can_post(), "voice channel denies send");
        assert!(!reef.destinations[1].text_based);
        assert_eq!(reef.first_postable().unwrap().id, "g1-general");
        assert!(communities[1].first_postable().is_none(), "g2 not yet loaded");
    }

    #[test]
    fn test_channel_and_role_events() {
        let cache = GatewayCache::new();
        ready(&cache);
        cache.apply_event("GUILD_CREATE", guild_create("g1", "Reef"));

        cache.apply_event(
            "CHANNEL_UPDATE",
            json!({ "id": "g1-general", "type": 0, "guild_id": "g1", "name": "general",
                    "permission_overwrites": [{ "id": "g1", "type": 0, "allow": "0", "deny": "1024" }] }),
        );
        assert!(cache.communities()[0].first_postable().is_none());

        cache.apply_event("GUILD_ROLE_CREATE", json!({ "guild_id": "g1", "role": { "id": "helper", "permissions": "0" } }));
        cache.apply_event(
            "CHANNEL_UPDATE",
            json!({ "id": "g1-general", "type": 0, "guild_id": "g1", "name": "general",
                    "permission_overwrites": [
                        { "id": "g1", "type": 0, "allow": "0", "deny": "1024" },
                        { "id": "helper", "type": 0, "allow": "1024", "deny": "0" }
                    ] }),
        );
        cache.apply_event(
            "GUILD_MEMBER_UPDATE",
            json!({ "guild_id": "g1", "user": { "id": "bot", "username": "Shark Bot" }, "roles": ["helper"] }),
        );
        assert_eq!(cache.communities()[0].first_postable().unwrap().id, "g1-general");

        cache.apply_event("CHANNEL_DELETE", json!({ "id": "g1-general", "type": 0, "guild_id": "g1" }));
        assert_eq!(cache.communities()[0].destinations.len(), 2);
    }

    #[test]
    fn test_guild_delete_respects_outages() {
        let cache = GatewayCache::new();
        ready(&cache);
        cache.apply_event("GUILD_DELETE", json!({ "id": "g1", "unavailable": true }));
        assert_eq!(cache.guild_count(), 2);
        cache.apply_event("GUILD_DELETE", json!({ "id": "g1" }));
        assert_eq!(cache.guild_count(), 1);
        assert_eq!(cache.communities()[0].id, "g2");
    }

    #[test]
    fn test_unknown_and_malformed_events() {
        let cache = GatewayCache::new();
        assert!(!cache.apply_event("TYPING_START", json!({})));
        assert!(!cache.apply_event("GUILD_CREATE", json!({ "name": "no id" })));
    }
}
