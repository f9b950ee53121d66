//! User records.

use serde::{Deserialize, Serialize};

use crate::storage::Record;

/// A user as sent by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// `username#discriminator`, or the bare username for accounts without one.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(discriminator) if discriminator != "0" => {
                format!("{}#{}", self.username, discriminator)
            }
            _ => self.username.clone(),
        }
    }
}

impl Record for User {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

/// The identity the client is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUser {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub mfa_enabled: bool,
    #[serde(default)]
    pub email: Option<String>,
}

impl ClientUser {
    /// Id of the logged-in user.
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_user_flattens_user() {
        let me: ClientUser = serde_json::from_value(json!({
            "id": "42",
            "username": "orchestrator",
            "discriminator": "0001",
            "bot": true,
            "verified": true,
            "mfa_enabled": false,
        }))
        .unwrap();

        assert_eq!(me.id(), "42");
        assert!(me.user.bot);
        assert!(me.verified);
        assert_eq!(me.user.tag(), "orchestrator#0001");
    }

    #[test]
    fn test_tag_without_discriminator() {
        let user: User = serde_json::from_value(json!({
            "id": "7",
            "username": "plain",
            "discriminator": "0",
        }))
        .unwrap();
        assert_eq!(user.tag(), "plain");
    }
}
