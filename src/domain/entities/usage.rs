use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Invocation;

/// One record of a dispatched command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub username: String,
    pub guild_id: Option<String>,
    pub guild_name: Option<String>,
    pub command_name: String,
}

impl UsageEntry {
    pub fn from_invocation(invocation: &Invocation, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            user_id: invocation.user.id.clone(),
            username: invocation.user.tag(),
            guild_id: invocation.guild_id.clone(),
            guild_name: invocation.guild_name.clone(),
            command_name: invocation.command_name.clone(),
        }
    }
}
