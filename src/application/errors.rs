//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Discord API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Interaction error: {0}")]
    Interaction(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Errors after which reconnecting to the gateway is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Auth(_) | BotError::Config(_))
    }
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Gateway call failed: {0}")]
    Gateway(Box<BotError>),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl From<BotError> for CommandError {
    fn from(err: BotError) -> Self {
        CommandError::Gateway(Box::new(err))
    }
}

/// Command registration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Command '{0}' already registered")]
    Duplicate(String),

    #[error("Invalid command name: '{0}'")]
    InvalidName(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
