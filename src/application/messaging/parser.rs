//! Command-line parser - turns typed lines like `/say message:"hi there"` into invocations

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::application::errors::BotError;
use crate::domain::entities::{
    CommandRegistry, InteractionRef, Invocation, OptionKind, OptionValue, User, DISCORD_EPOCH_MS,
};

/// Parses text lines into command invocations, typing options via the registry
pub struct CommandLineParser {
    command_prefix: String,
    application_id: String,
    sequence: AtomicU64,
}

impl CommandLineParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
            application_id: "console".to_string(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn is_command(&self, line: &str) -> bool {
        line.trim_start().starts_with(&self.command_prefix)
    }

    /// Parse a line into an invocation from `user`, in `channel_id` of `guild`
    pub fn parse(
        &self,
        line: &str,
        registry: &CommandRegistry,
        user: User,
        channel_id: &str,
        guild: Option<(&str, &str)>,
    ) -> Result<Invocation, BotError> {
        let line = line.trim();
        let body = line
            .strip_prefix(&self.command_prefix)
            .ok_or_else(|| BotError::Parse(format!("not a command: {}", line)))?;

        let tokens = tokenize(body)?;
        let mut tokens = tokens.into_iter();
        let name = tokens
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| BotError::Parse("missing command name".to_string()))?;

        let mut pairs: Vec<(String, String)> = Vec::new();
        for token in tokens {
            match token.split_once(':') {
                Some((key, value)) if !key.is_empty() => {
                    pairs.push((key.to_string(), value.to_string()));
                }
                // Bare words continue the previous value: `message:hello there`.
                _ => match pairs.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(&token);
                    }
                    None => {
                        return Err(BotError::Parse(format!(
                            "expected name:value, got '{}'",
                            token
                        )))
                    }
                },
            }
        }

        let interaction = InteractionRef {
            id: self.next_snowflake(),
            token: format!("console-{}", self.sequence.load(Ordering::Relaxed)),
            application_id: self.application_id.clone(),
        };

        let spec = registry.get(&name).map(|c| c.spec());
        let mut invocation = Invocation::new(interaction, name, user).in_channel(channel_id);
        if let Some((id, guild_name)) = guild {
            invocation = invocation.in_guild(id, Some(guild_name.to_string()));
        }

        for (key, raw) in pairs {
            let kind = spec
                .as_ref()
                .and_then(|s| s.options.iter().find(|o| o.name == key))
                .map(|o| o.kind)
                .unwrap_or(OptionKind::String);
            let value = typed_value(kind, &key, raw)?;
            invocation = invocation.with_option(key, value);
        }

        Ok(invocation)
    }

    fn next_snowflake(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = (Utc::now().timestamp_millis() - DISCORD_EPOCH_MS).max(0) as u64;
        ((millis << 22) | (seq & 0xfff)).to_string()
    }
}

fn typed_value(kind: OptionKind, key: &str, raw: String) -> Result<OptionValue, BotError> {
    let invalid = |what: &str| BotError::Parse(format!("option '{}' expects {}", key, what));
    Ok(match kind {
        OptionKind::String => OptionValue::String(raw),
        OptionKind::Integer => OptionValue::Integer(raw.parse().map_err(|_| invalid("an integer"))?),
        OptionKind::Number => OptionValue::Number(raw.parse().map_err(|_| invalid("a number"))?),
        OptionKind::Boolean => OptionValue::Boolean(raw.parse().map_err(|_| invalid("true or false"))?),
        OptionKind::User | OptionKind::Channel | OptionKind::Role | OptionKind::Mentionable => {
            // Accept mention syntax: <#123>, <@123>, <@&123>
            let id = raw
                .trim_start_matches('<')
                .trim_end_matches('>')
                .trim_start_matches(['#', '@', '&', '!'])
                .to_string();
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("an id"));
            }
            OptionValue::Snowflake(id)
        }
    })
}

/// Whitespace split that keeps double-quoted runs together
fn tokenize(input: &str) -> Result<Vec<String>, BotError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err(BotError::Parse("unterminated quote".to_string()));
    }
    if !current.is_empty() || quoted {
        tokens.push(current);
    }
    Ok(tokens)
}
