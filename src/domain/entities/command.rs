use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};

use crate::application::errors::RegistryError;
use crate::domain::traits::SlashCommand;

/// Kind of a slash-command option, serialized as the gateway's numeric type code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
}

impl OptionKind {
    pub fn code(self) -> u8 {
        match self {
            OptionKind::String => 3,
            OptionKind::Integer => 4,
            OptionKind::Boolean => 5,
            OptionKind::User => 6,
            OptionKind::Channel => 7,
            OptionKind::Role => 8,
            OptionKind::Mentionable => 9,
            OptionKind::Number => 10,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(OptionKind::String),
            4 => Some(OptionKind::Integer),
            5 => Some(OptionKind::Boolean),
            6 => Some(OptionKind::User),
            7 => Some(OptionKind::Channel),
            8 => Some(OptionKind::Role),
            9 => Some(OptionKind::Mentionable),
            10 => Some(OptionKind::Number),
            _ => None,
        }
    }
}

impl Serialize for OptionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A single declared parameter of a command
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Declarative part of a command: what gets published to the gateway
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(
        mut self,
        kind: OptionKind,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.options.push(CommandOption {
            kind,
            name: name.into(),
            description: description.into(),
            required,
        });
        self
    }

    /// Slash command names: 1-32 chars, lowercase letters, digits, `-` or `_`.
    pub fn has_valid_name(&self) -> bool {
        !self.name.is_empty()
            && self.name.len() <= 32
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    }
}

/// Command registry, filled once at startup and read-only afterwards
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn SlashCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Arc<dyn SlashCommand>) -> Result<(), RegistryError> {
        let spec = command.spec();
        if !spec.has_valid_name() {
            return Err(RegistryError::InvalidName(spec.name));
        }
        if self.commands.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        tracing::info!("[LOADED] Command: {}", spec.name);
        self.commands.insert(spec.name, command);
        Ok(())
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<Arc<dyn SlashCommand>> {
        self.commands.get(name).cloned()
    }

    /// Specs in name order, ready to publish
    pub fn specs(&self) -> Vec<CommandSpec> {
        let mut specs: Vec<CommandSpec> = self.commands.values().map(|c| c.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
