//! Fetch operations over the request channel.
//!
//! # Responsibilities
//! - Call the request channel and turn raw JSON into records
//! - Signal `error` when a fetched payload can not become a record
//!
//! # Design Decisions
//! - Request failures go back to the caller only; the caller's `Result` is
//!   the failure handler
//! - `fetch_user` answers from the user store first and never signals

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::client::Client;
use crate::error::{ClientError, ClientResult, DecodeError};
use crate::events::ClientEvent;
use crate::models::{Invite, OAuthApplication, Permissions, User, VoiceRegion, Webhook};
use crate::transport::TransportError;

/// Authorization page bot invites point to.
pub const OAUTH_AUTHORIZE_URL: &str = "https://discordapp.com/oauth2/authorize";

static INVITE_URL: OnceLock<Option<Regex>> = OnceLock::new();

/// Extract the code from an invite URL; anything else is taken as a code.
fn invite_code(input: &str) -> &str {
    let pattern = INVITE_URL.get_or_init(|| {
        Regex::new(r"(?i)discord(?:app\.com/invite|\.gg)/([\w-]{2,255})").ok()
    });

    pattern
        .as_ref()
        .and_then(|re| re.captures(input))
        .and_then(|captures| captures.get(1))
        .map(|code| code.as_str())
        .unwrap_or(input)
}

impl Client {
    /// The OAuth application of the logged in bot.
    pub async fn fetch_application(&self) -> ClientResult<OAuthApplication> {
        let raw = self
            .inner
            .requests
            .current_application()
            .await
            .map_err(ClientError::Request)?;
        self.decode("application", raw)
    }

    /// Look up an invite by code or invite URL.
    pub async fn fetch_invite(&self, invite: &str) -> ClientResult<Invite> {
        let code = invite_code(invite);
        tracing::debug!(code, "Fetching invite");

        let raw = self
            .inner
            .requests
            .invite(code)
            .await
            .map_err(ClientError::Request)?;
        self.decode("invite", raw)
    }

    /// A user by id, from the user store when cached.
    pub async fn fetch_user(&self, id: &str) -> ClientResult<Arc<User>> {
        if let Some(user) = self.inner.users.get(id) {
            return Ok(user);
        }

        let raw = self
            .inner
            .requests
            .user(id)
            .await
            .map_err(ClientError::Request)?;
        Ok(self.inner.users.factory(raw)?)
    }

    /// Available voice regions keyed by id.
    pub async fn fetch_voice_regions(&self) -> ClientResult<BTreeMap<String, VoiceRegion>> {
        let raw = self
            .inner
            .requests
            .voice_regions()
            .await
            .map_err(ClientError::Request)?;
        let regions: Vec<VoiceRegion> = self.decode("voice regions", raw)?;

        Ok(regions
            .into_iter()
            .map(|region| (region.id.clone(), region))
            .collect())
    }

    /// A webhook by id; with a non-empty `token` the token-authenticated lookup is used.
    pub async fn fetch_webhook(&self, id: &str, token: Option<&str>) -> ClientResult<Webhook> {
        let requests = &self.inner.requests;
        let raw = match token.filter(|token| !token.is_empty()) {
            Some(token) => requests.webhook_with_token(id, token).await,
            None => requests.webhook(id).await,
        }
        .map_err(ClientError::Request)?;
        self.decode("webhook", raw)
    }

    /// Link that invites the bot to a guild with `permissions`.
    pub async fn generate_oauth_invite(&self, permissions: Permissions) -> ClientResult<String> {
        let application = self.fetch_application().await?;
        let bitfield = permissions.bitfield().to_string();

        let url = Url::parse_with_params(
            OAUTH_AUTHORIZE_URL,
            &[
                ("client_id", application.id.as_str()),
                ("permissions", bitfield.as_str()),
                ("scope", "bot"),
            ],
        )
        .map_err(|e| ClientError::Request(TransportError::Address(e)))?;

        Ok(url.into())
    }

    /// Build a record, signalling `error` when the payload does not fit.
    fn decode<T: DeserializeOwned>(&self, what: &'static str, raw: Value) -> ClientResult<T> {
        serde_json::from_value(raw).map_err(|e| {
            let error = DecodeError::new(what, &e);
            tracing::warn!(error = %error, "Fetched payload rejected");
            self.inner
                .events
                .emit(ClientEvent::Error(Arc::new(ClientError::Decode(error.clone()))));
            ClientError::Decode(error)
        })
    }
}
