//! Configuration management
//!
//! Precedence, lowest first: defaults, YAML file, `.env`, process environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::application::errors::ConfigError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_WEB_USERNAME: &str = "admin";
pub const DEFAULT_WEB_PASSWORD: &str = "changeme";
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub discord: DiscordConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DiscordConfig {
    pub token: Option<String>,
    /// Application id; learned from READY when unset
    pub client_id: Option<String>,
    pub owner_id: Option<String>,
    pub gateway_url: String,
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            client_id: None,
            owner_id: None,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WebConfig {
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            username: DEFAULT_WEB_USERNAME.to_string(),
            password: DEFAULT_WEB_PASSWORD.to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Defaults or `path` if it exists, then `.env`, then the environment
    pub fn from_sources(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Config::load(path)?
        } else {
            Config::default()
        };

        match dotenvy::dotenv() {
            Ok(env_path) => tracing::debug!("Loaded environment from {}", env_path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("DISCORD_TOKEN") {
            self.discord.token = Some(token);
        }
        if let Some(id) = non_empty("CLIENT_ID") {
            self.discord.client_id = Some(id);
        }
        if let Some(id) = non_empty("OWNER_ID") {
            self.discord.owner_id = Some(id);
        }
        if let Some(url) = non_empty("DISCORD_GATEWAY_URL") {
            self.discord.gateway_url = url;
        }
        if let Some(base) = non_empty("DISCORD_API_BASE") {
            self.discord.api_base = base;
        }
        if let Some(port) = non_empty("PORT") {
            self.web.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("PORT must be a port number, got '{}'", port)))?;
        }
        if let Some(username) = non_empty("WEB_USERNAME") {
            self.web.username = username;
        }
        if let Some(password) = non_empty("WEB_PASSWORD") {
            self.web.password = password;
        }
        Ok(())
    }

    /// The gateway token; its absence is a startup failure
    pub fn token(&self) -> Result<&str, ConfigError> {
        self.discord
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField("DISCORD_TOKEN".to_string()))
    }

    pub fn uses_default_password(&self) -> bool {
        self.web.password == DEFAULT_WEB_PASSWORD
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.web.username, "admin");
        assert_eq!(config.web.password, "changeme");
        assert!(config.uses_default_password());
        assert!(config.token().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("DISCORD_TOKEN", "abc"),
                ("OWNER_ID", "900"),
                ("PORT", "8080"),
                ("WEB_PASSWORD", "s3cret"),
                ("CLIENT_ID", ""),
            ]))
            .unwrap();
        assert_eq!(config.token().unwrap(), "abc");
        assert_eq!(config.discord.owner_id.as_deref(), Some("900"));
        assert_eq!(config.discord.client_id, None, "empty values are ignored");
        assert_eq!(config.web.port, 8080);
        assert!(!config.uses_default_password());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("PORT", "ocean")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("web:\n  port: 4000\ndiscord:\n  owner-id: \"77\"\n").unwrap();
        assert_eq!(config.web.port, 4000);
        assert_eq!(config.web.username, "admin");
        assert_eq!(config.discord.owner_id.as_deref(), Some("77"));
        assert_eq!(config.discord.gateway_url, DEFAULT_GATEWAY_URL);
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = Config::default().to_yaml().unwrap();
        assert!(yaml.contains("api-base"));
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.web.port, DEFAULT_PORT);
    }
}
