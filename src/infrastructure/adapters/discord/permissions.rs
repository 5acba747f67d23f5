//! Effective channel permissions for the bot's own member

use super::cache::{ChannelState, GuildState, OverwriteKind};
use crate::domain::entities::Permissions;

/// Guild-wide permissions: owner and administrators get everything,
/// everyone else the union of @everyone and their roles.
pub fn base_permissions(guild: &GuildState, user_id: &str) -> Permissions {
    if guild.owner_id.as_deref() == Some(user_id) {
        return Permissions::ALL;
    }

    // The @everyone role shares the guild's id.
    let mut perms = guild.roles.get(&guild.id).copied().unwrap_or_default();
    for role_id in &guild.member_roles {
        if let Some(role) = guild.roles.get(role_id) {
            perms = perms | *role;
        }
    }

    if perms.contains(Permissions::ADMINISTRATOR) {
        Permissions::ALL
    } else {
        perms
    }
}

/// Applies, in order: the @everyone overwrite, the combined role overwrites,
/// then the member-specific overwrite.
pub fn channel_permissions(guild: &GuildState, channel: &ChannelState, user_id: &str) -> Permissions {
    let mut perms = base_permissions(guild, user_id);
    if perms.contains(Permissions::ADMINISTRATOR) {
        return Permissions::ALL;
    }

    if let Some(everyone) = channel
        .overwrites
        .iter()
        .find(|o| o.kind == OverwriteKind::Role && o.id == guild.id)
    {
        perms = (perms & !everyone.deny) | everyone.allow;
    }

    let mut allow = Permissions::NONE;
    let mut deny = Permissions::NONE;
    for overwrite in channel
        .overwrites
        .iter()
        .filter(|o| o.kind == OverwriteKind::Role && guild.member_roles.contains(&o.id))
    {
        allow = allow | overwrite.allow;
        deny = deny | overwrite.deny;
    }
    perms = (perms & !deny) | allow;

    if let Some(member) = channel
        .overwrites
        .iter()
        .find(|o| o.kind == OverwriteKind::Member && o.id == user_id)
    {
        perms = (perms & !member.deny) | member.allow;
    }

    perms
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::infrastructure::adapters::discord::cache::Overwrite;

    const BOT: &str = "bot";
    const VIEW: Permissions = Permissions::VIEW_CHANNEL;
    const SEND: Permissions = Permissions::SEND_MESSAGES;

    fn guild(everyone: Permissions) -> GuildState {
        let mut roles = HashMap::new();
        roles.insert("g".to_string(), everyone);
        roles.insert("helper".to_string(), SEND);
        roles.insert("admin".to_string(), Permissions::ADMINISTRATOR);
        GuildState {
            id: "g".into(),
            name: "Reef".into(),
            owner_id: Some("someone-else".into()),
            roles,
            channels: Vec::new(),
            member_roles: Vec::new(),
        }
    }

    fn channel(overwrites: Vec<Overwrite>) -> ChannelState {
        ChannelState {
            id: "c".into(),
            name: "general".into(),
            kind: 0,
            overwrites,
        }
    }

    fn role_overwrite(id: &str, allow: Permissions, deny: Permissions) -> Overwrite {
        Overwrite {
            id: id.into(),
            kind: OverwriteKind::Role,
            allow,
            deny,
        }
    }

    #[test]
    fn test_roles_union_with_everyone() {
        let mut g = guild(VIEW);
        assert_eq!(base_permissions(&g, BOT), VIEW);
        g.member_roles = vec!["helper".into()];
        assert_eq!(base_permissions(&g, BOT), VIEW | SEND);
    }

    #[test]
    fn test_owner_and_admin_get_everything() {
        let mut g = guild(Permissions::NONE);
        g.owner_id = Some(BOT.into());
        assert_eq!(base_permissions(&g, BOT), Permissions::ALL);

        let mut g = guild(Permissions::NONE);
        g.member_roles = vec!["admin".into()];
        let locked = channel(vec![role_overwrite("g", Permissions::NONE, VIEW | SEND)]);
        assert_eq!(channel_permissions(&g, &locked, BOT), Permissions::ALL);
    }

    #[test]
    fn test_everyone_overwrite_denies() {
        let g = guild(VIEW | SEND);
        let c = channel(vec![role_overwrite("g", Permissions::NONE, SEND)]);
        assert_eq!(channel_permissions(&g, &c, BOT), VIEW);
    }

    #[test]
    fn test_role_overwrite_beats_everyone_overwrite() {
        let mut g = guild(VIEW | SEND);
        g.member_roles = vec!["helper".into()];
        let c = channel(vec![
            role_overwrite("g", Permissions::NONE, VIEW | SEND),
            role_overwrite("helper", VIEW | SEND, Permissions::NONE),
        ]);
        assert!(channel_permissions(&g, &c, BOT).contains(VIEW | SEND));
    }

    #[test]
    fn test_member_overwrite_applies_last() {
        let mut g = guild(VIEW | SEND);
        g.member_roles = vec!["helper".into()];
        let c = channel(vec![
            role_overwrite("helper", SEND, Permissions::NONE),
            Overwrite {
                id: BOT.into(),
                kind: OverwriteKind::Member,
                allow: Permissions::NONE,
                deny: SEND,
            },
        ]);
        assert_eq!(channel_permissions(&g, &c, BOT), VIEW);
    }
}
