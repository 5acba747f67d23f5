use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents a gateway user (the invoker of a command, or the bot itself)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            discriminator: None,
            global_name: None,
            bot: false,
        }
    }

    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    /// `username#1234` for legacy accounts, plain `username` once migrated
    /// to unique usernames (discriminator "0").
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_with_legacy_discriminator() {
        let user = User::new("1", "finn").with_discriminator("0420");
        assert_eq!(user.tag(), "finn#0420");
    }

    #[test]
    fn test_tag_for_migrated_username() {
        let user = User::new("1", "finn").with_discriminator("0");
        assert_eq!(user.tag(), "finn");
        assert_eq!(User::new("2", "gill").tag(), "gill");
    }
}
