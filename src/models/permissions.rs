//! Permission bitfield used for OAuth invites.

use crate::error::ClientError;

/// Named permission flags.
pub const FLAGS: &[(&str, u64)] = &[
    ("CREATE_INSTANT_INVITE", 1 << 0),
    ("KICK_MEMBERS", 1 << 1),
    ("BAN_MEMBERS", 1 << 2),
    ("ADMINISTRATOR", 1 << 3),
    ("MANAGE_CHANNELS", 1 << 4),
    ("MANAGE_GUILD", 1 << 5),
    ("ADD_REACTIONS", 1 << 6),
    ("VIEW_AUDIT_LOG", 1 << 7),
    ("PRIORITY_SPEAKER", 1 << 8),
    ("STREAM", 1 << 9),
    ("VIEW_CHANNEL", 1 << 10),
    ("SEND_MESSAGES", 1 << 11),
    ("SEND_TTS_MESSAGES", 1 << 12),
    ("MANAGE_MESSAGES", 1 << 13),
    ("EMBED_LINKS", 1 << 14),
    ("ATTACH_FILES", 1 << 15),
    ("READ_MESSAGE_HISTORY", 1 << 16),
    ("MENTION_EVERYONE", 1 << 17),
    ("USE_EXTERNAL_EMOJIS", 1 << 18),
    ("CONNECT", 1 << 20),
    ("SPEAK", 1 << 21),
    ("MUTE_MEMBERS", 1 << 22),
    ("DEAFEN_MEMBERS", 1 << 23),
    ("MOVE_MEMBERS", 1 << 24),
    ("USE_VAD", 1 << 25),
    ("CHANGE_NICKNAME", 1 << 26),
    ("MANAGE_NICKNAMES", 1 << 27),
    ("MANAGE_ROLES", 1 << 28),
    ("MANAGE_WEBHOOKS", 1 << 29),
    ("MANAGE_EMOJIS", 1 << 30),
];

/// Set of permission flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    bits: u64,
}

impl Permissions {
    /// Empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from flag names (case-insensitive).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ClientError> {
        let mut permissions = Self::new();
        for name in names {
            permissions.add(name.as_ref())?;
        }
        Ok(permissions)
    }

    /// Wrap a raw bitfield as received from the API.
    pub fn from_bits(bits: u64) -> Self {
        Self { bits }
    }

    /// Add a permission by name.
    pub fn add(&mut self, name: &str) -> Result<&mut Self, ClientError> {
        let bit = resolve(name).ok_or_else(|| ClientError::UnknownPermission(name.to_string()))?;
        self.bits |= bit;
        Ok(self)
    }

    /// Add raw permission bits.
    pub fn add_bits(&mut self, bits: u64) -> &mut Self {
        self.bits |= bits;
        self
    }

    /// Check if the named permission is set. Unknown names are never set.
    pub fn has(&self, name: &str) -> bool {
        resolve(name).is_some_and(|bit| self.bits & bit == bit)
    }

    /// Raw bitfield.
    pub fn bitfield(&self) -> u64 {
        self.bits
    }
}

fn resolve(name: &str) -> Option<u64> {
    FLAGS
        .iter()
        .find(|(flag, _)| flag.eq_ignore_ascii_case(name))
        .map(|(_, bit)| *bit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_names() {
        let permissions = Permissions::from_names(&["SEND_MESSAGES", "view_channel"]).unwrap();
        assert_eq!(permissions.bitfield(), (1 << 11) | (1 << 10));
        assert!(permissions.has("send_messages"));
        assert!(!permissions.has("ADMINISTRATOR"));
    }

    #[test]
    fn test_unknown_name_rejected() {
        let err = Permissions::from_names(&["FLY"]).unwrap_err();
        assert!(matches!(err, ClientError::UnknownPermission(name) if name == "FLY"));
    }

    #[test]
    fn test_add_bits() {
        let mut permissions = Permissions::new();
        permissions.add_bits(8).add_bits(1);
        assert_eq!(permissions.bitfield(), 9);
        assert!(permissions.has("ADMINISTRATOR"));
    }
}
