//! Domain records.
//!
//! Records are plain serde structs built from the raw JSON the collaborators
//! return. The cached kinds implement [`Record`](crate::storage::Record).

pub mod permissions;
pub mod resources;
pub mod user;

pub use permissions::Permissions;
pub use resources::{
    Channel, Emoji, Guild, Invite, InviteChannel, InviteGuild, OAuthApplication, Presence,
    PresenceUser, VoiceRegion, Webhook,
};
pub use user::{ClientUser, User};
