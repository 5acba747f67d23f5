use std::ops::{BitAnd, BitOr, Not};

/// Permission bit set, using the gateway's bit positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const ALL: Permissions = Permissions(u64::MAX);
    pub const ADMINISTRATOR: Permissions = Permissions(1 << 3);
    pub const VIEW_CHANNEL: Permissions = Permissions(1 << 10);
    pub const SEND_MESSAGES: Permissions = Permissions(1 << 11);

    pub fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parses the decimal string form used in gateway payloads.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.parse().ok().map(Permissions)
    }
}

impl BitOr for Permissions {
    type Output = Permissions;
    fn bitor(self, rhs: Self) -> Self {
        Permissions(self.0 | rhs.0)
    }
}

impl BitAnd for Permissions {
    type Output = Permissions;
    fn bitand(self, rhs: Self) -> Self {
        Permissions(self.0 & rhs.0)
    }
}

impl Not for Permissions {
    type Output = Permissions;
    fn not(self) -> Self {
        Permissions(!self.0)
    }
}

/// A channel inside a community, with the bot's effective permissions in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: String,
    pub name: String,
    pub text_based: bool,
    pub permissions: Permissions,
}

impl Destination {
    pub fn can_post(&self) -> bool {
        self.text_based
            && self
                .permissions
                .contains(Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES)
    }
}

/// A joined guild as seen at the time of the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Community {
    pub id: String,
    pub name: String,
    pub destinations: Vec<Destination>,
}

impl Community {
    /// First destination, in listing order, the bot may view and send in
    pub fn first_postable(&self) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.can_post())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(id: &str, text_based: bool, perms: Permissions) -> Destination {
        Destination {
            id: id.to_string(),
            name: id.to_string(),
            text_based,
            permissions: perms,
        }
    }

    #[test]
    fn test_can_post_needs_view_and_send() {
        let both = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        assert!(dest("a", true, both).can_post());
        assert!(!dest("b", true, Permissions::VIEW_CHANNEL).can_post());
        assert!(!dest("c", true, Permissions::SEND_MESSAGES).can_post());
        assert!(!dest("d", false, both).can_post());
    }

    #[test]
    fn test_first_postable_keeps_listing_order() {
        let both = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        let community = Community {
            id: "g".into(),
            name: "Reef".into(),
            destinations: vec![
                dest("voice", false, both),
                dest("locked", true, Permissions::VIEW_CHANNEL),
                dest("general", true, both),
                dest("offtopic", true, both),
            ],
        };
        assert_eq!(community.first_postable().unwrap().id, "general");
    }

    #[test]
    fn test_parse_permissions() {
        assert_eq!(Permissions::parse("3072"), Some(Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES));
        assert_eq!(Permissions::parse("nope"), None);
    }
}
