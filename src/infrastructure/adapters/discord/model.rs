//! Gateway and REST payload shapes (only the fields the bot reads)

use serde::Deserialize;
use serde_json::Value;

use crate::domain::entities::{InteractionRef, Invocation, OptionKind, OptionValue, User};

/// Interaction type for application (slash) commands
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;
/// Application command type for chat-input (slash) commands
pub const COMMAND_CHAT_INPUT: u8 = 1;

#[derive(Debug, Deserialize)]
pub struct GatewayPayload {
    pub op: u64,
    #[serde(default)]
    pub d: Option<Value>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialApplication {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyEvent {
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    #[serde(default)]
    pub application: Option<PartialApplication>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnavailableGuild {
    pub id: String,
    #[serde(default)]
    pub unavailable: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolePayload {
    pub id: String,
    pub permissions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverwritePayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub allow: String,
    pub deny: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permission_overwrites: Vec<OverwritePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberPayload {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildPayload {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<RolePayload>,
    #[serde(default)]
    pub channels: Vec<ChannelPayload>,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildMemberUpdate {
    pub guild_id: String,
    pub user: User,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildRoleEvent {
    pub guild_id: String,
    pub role: RolePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildRoleDelete {
    pub guild_id: String,
    pub role_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandDataOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<u8>,
    #[serde(default)]
    pub options: Vec<CommandDataOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    pub id: String,
    pub application_id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    #[serde(default)]
    pub data: Option<CommandData>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub member: Option<MemberPayload>,
    /// Set instead of `member` for DMs
    #[serde(default)]
    pub user: Option<User>,
}

impl InteractionPayload {
    /// Chat-input command invocations only; anything else yields `None`.
    pub fn into_invocation(self, guild_name: Option<String>) -> Option<Invocation> {
        if self.kind != INTERACTION_APPLICATION_COMMAND {
            return None;
        }
        let data = self.data?;
        if data.kind.unwrap_or(COMMAND_CHAT_INPUT) != COMMAND_CHAT_INPUT {
            return None;
        }
        let user = self.member.and_then(|m| m.user).or(self.user)?;

        let interaction = InteractionRef {
            id: self.id,
            token: self.token,
            application_id: self.application_id,
        };
        let mut invocation = Invocation::new(interaction, data.name, user);
        if let Some(guild_id) = self.guild_id {
            invocation = invocation.in_guild(guild_id, guild_name);
        }
        if let Some(channel_id) = self.channel_id {
            invocation = invocation.in_channel(channel_id);
        }
        for option in data.options {
            if let Some(value) = option_value(option.kind, option.value.as_ref()) {
                invocation = invocation.with_option(option.name, value);
            }
        }
        Some(invocation)
    }
}

fn option_value(kind: u8, value: Option<&Value>) -> Option<OptionValue> {
    let value = value?;
    match OptionKind::from_code(kind)? {
        OptionKind::String => value.as_str().map(|s| OptionValue::String(s.to_string())),
        OptionKind::Integer => value.as_i64().map(OptionValue::Integer),
        OptionKind::Boolean => value.as_bool().map(OptionValue::Boolean),
        OptionKind::Number => value.as_f64().map(OptionValue::Number),
        OptionKind::User | OptionKind::Channel | OptionKind::Role | OptionKind::Mentionable => {
            value.as_str().map(|s| OptionValue::Snowflake(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guild_interaction() -> Value {
        json!({
            "id": "175928847299117063",
            "application_id": "555",
            "type": 2,
            "token": "interaction-token",
            "guild_id": "1",
            "channel_id": "100",
            "member": {
                "user": { "id": "7", "username": "finn", "discriminator": "0", "global_name": "Finn" },
                "roles": []
            },
            "data": {
                "id": "cmd",
                "name": "say",
                "type": 1,
                "options": [
                    { "name": "message", "type": 3, "value": "hello" },
                    { "name": "channel", "type": 7, "value": "200" }
                ]
            }
        })
    }

    #[test]
    fn test_guild_interaction_to_invocation() {
        let payload: InteractionPayload = serde_json::from_value(guild_interaction()).unwrap();
        let inv = payload.into_invocation(Some("Reef".into())).unwrap();
        assert_eq!(inv.command_name, "say");
        assert_eq!(inv.user.id, "7");
        assert_eq!(inv.guild_id.as_deref(), Some("1"));
        assert_eq!(inv.guild_name.as_deref(), Some("Reef"));
        assert_eq!(inv.channel_id.as_deref(), Some("100"));
        assert_eq!(inv.string_option("message"), Some("hello"));
        assert_eq!(inv.option("channel"), Some(&OptionValue::Snowflake("200".into())));
        assert_eq!(inv.interaction.token, "interaction-token");
        assert_eq!(inv.created_at.timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn test_dm_interaction_uses_top_level_user() {
        let mut raw = guild_interaction();
        raw.as_object_mut().unwrap().remove("member");
        raw.as_object_mut().unwrap().remove("guild_id");
        raw["user"] = json!({ "id": "8", "username": "gill" });
        let payload: InteractionPayload = serde_json::from_value(raw).unwrap();
        let inv = payload.into_invocation(None).unwrap();
        assert_eq!(inv.user.id, "8");
        assert!(inv.guild_id.is_none());
        assert_eq!(inv.origin_label(), "DM");
    }

    #[test]
    fn test_non_chat_input_is_skipped() {
        let mut raw = guild_interaction();
        raw["type"] = json!(3);
        let payload: InteractionPayload = serde_json::from_value(raw).unwrap();
        assert!(payload.into_invocation(None).is_none());

        let mut raw = guild_interaction();
        raw["data"]["type"] = json!(2);
        let payload: InteractionPayload = serde_json::from_value(raw).unwrap();
        assert!(payload.into_invocation(None).is_none());
    }

    #[test]
    fn test_option_values_typed_by_kind() {
        assert_eq!(option_value(4, Some(&json!(3))), Some(OptionValue::Integer(3)));
        assert_eq!(option_value(5, Some(&json!(true))), Some(OptionValue::Boolean(true)));
        assert_eq!(option_value(10, Some(&json!(1.5))), Some(OptionValue::Number(1.5)));
        assert_eq!(option_value(9, Some(&json!("42"))), Some(OptionValue::Snowflake("42".into())));
        // Wrong JSON shape for the kind, unknown kinds and subcommands are dropped.
        assert_eq!(option_value(4, Some(&json!("three"))), None);
        assert_eq!(option_value(11, Some(&json!("att"))), None);
        assert_eq!(option_value(1, None), None);
    }
}
