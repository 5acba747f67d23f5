use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use super::User;

/// Milliseconds between the Unix epoch and the Discord epoch (2015-01-01).
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Creation time encoded in the upper 42 bits of a snowflake id
pub fn snowflake_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let raw: u64 = id.parse().ok()?;
    let millis = (raw >> 22) as i64 + DISCORD_EPOCH_MS;
    Utc.timestamp_millis_opt(millis).single()
}

/// Value supplied for a command option
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Number(f64),
    /// User, channel or role id
    Snowflake(String),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) | OptionValue::Snowflake(s) => Some(s),
            _ => None,
        }
    }
}

/// What is needed to answer an interaction after the fact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: String,
    pub token: String,
    pub application_id: String,
}

/// A single command call made by a user
#[derive(Debug, Clone)]
pub struct Invocation {
    pub interaction: InteractionRef,
    pub command_name: String,
    pub user: User,
    pub guild_id: Option<String>,
    pub guild_name: Option<String>,
    pub channel_id: Option<String>,
    pub options: HashMap<String, OptionValue>,
    pub created_at: DateTime<Utc>,
}

impl Invocation {
    pub fn new(interaction: InteractionRef, command_name: impl Into<String>, user: User) -> Self {
        let created_at = snowflake_timestamp(&interaction.id).unwrap_or_else(Utc::now);
        Self {
            interaction,
            command_name: command_name.into(),
            user,
            guild_id: None,
            guild_name: None,
            channel_id: None,
            options: HashMap::new(),
            created_at,
        }
    }

    pub fn in_guild(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.guild_id = Some(id.into());
        self.guild_name = name;
        self
    }

    pub fn in_channel(mut self, id: impl Into<String>) -> Self {
        self.channel_id = Some(id.into());
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: OptionValue) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    pub fn string_option(&self, name: &str) -> Option<&str> {
        self.option(name).and_then(OptionValue::as_str)
    }

    /// "guild name" or "DM" for private invocations
    pub fn origin_label(&self) -> &str {
        self.guild_name.as_deref().unwrap_or("DM")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_timestamp() {
        // Example id from the Discord developer docs.
        let ts = snowflake_timestamp("175928847299117063").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_462_015_105_796);
        assert!(snowflake_timestamp("not-a-number").is_none());
    }

    #[test]
    fn test_origin_label() {
        let interaction = InteractionRef {
            id: "1".into(),
            token: "t".into(),
            application_id: "app".into(),
        };
        let dm = Invocation::new(interaction.clone(), "ping", User::new("7", "finn"));
        assert_eq!(dm.origin_label(), "DM");

        let guild = dm.in_guild("10", Some("Reef".to_string()));
        assert_eq!(guild.origin_label(), "Reef");
    }
}
