//! Request channel over HTTP.
//!
//! # Responsibilities
//! - Resolve gateway addresses (authenticated lookup, or the cheap public one)
//! - Serve the raw endpoints used by the client's fetch operations
//! - Space requests apart by the configured pacing offset
//!
//! # Design Decisions
//! - Responses are returned as raw JSON; records are built by the client
//! - Pacing is a plain gap after each completed request, not a bucket algorithm
//! - `destroy` forgets the token and pacing state; the channel can be reused

use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use url::Url;

use crate::config::ClientOptions;
use crate::transport::{RequestChannel, TransportError};

/// Default base URL of the remote REST API.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// HTTP implementation of [`RequestChannel`].
pub struct HttpRequestChannel {
    client: reqwest::Client,
    api_base: Url,
    token: ArcSwapOption<String>,
    pacing: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpRequestChannel {
    /// Create a channel against `api_base`.
    pub fn new(api_base: &str, options: &ClientOptions) -> Result<Self, TransportError> {
        let api_base = Url::parse(api_base)?;
        if api_base.cannot_be_a_base() {
            return Err(TransportError::Rejected(format!(
                "'{}' can not be used as an API base",
                api_base
            )));
        }

        let pacing = Duration::try_from_secs_f64(options.request_pacing_offset_seconds.max(0.0))
            .unwrap_or_default();

        Ok(Self {
            client: reqwest::Client::new(),
            api_base,
            token: ArcSwapOption::empty(),
            pacing,
            last_request: Mutex::new(None),
        })
    }

    /// Gap enforced between two requests.
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Rejected(format!("invalid API base '{}'", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Wait until the pacing gap since the previous request has passed.
    ///
    /// The returned guard serializes requests while pacing is active.
    async fn pace(&self) -> Option<MutexGuard<'_, Option<Instant>>> {
        if self.pacing.is_zero() {
            return None;
        }

        let guard = self.last_request.lock().await;
        if let Some(previous) = *guard {
            tokio::time::sleep_until(previous + self.pacing).await;
        }
        Some(guard)
    }

    async fn get(&self, segments: &[&str], authenticated: bool) -> Result<Value, TransportError> {
        let url = self.endpoint(segments)?;
        let endpoint = url.path().to_string();

        let mut pacing = self.pace().await;

        let mut request = self.client.get(url);
        if authenticated {
            if let Some(token) = self.token.load_full() {
                request = request.header(AUTHORIZATION, format!("Bot {}", token));
            }
        }

        tracing::debug!(endpoint = %endpoint, "Sending request");
        let result = request.send().await;

        if let Some(last) = pacing.as_mut() {
            **last = Some(Instant::now());
        }

        let response = result?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint = %endpoint, status = %status, "Request rejected");
            return Err(TransportError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        Ok(response.json::<Value>().await?)
    }

    async fn gateway_url(&self, segments: &[&str], authenticated: bool) -> Result<String, TransportError> {
        let body = self.get(segments, authenticated).await?;
        body.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TransportError::Rejected("gateway response carries no url".to_string()))
    }
}

impl std::fmt::Debug for HttpRequestChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequestChannel")
            .field("api_base", &self.api_base.as_str())
            .field("pacing", &self.pacing)
            .field("authorized", &self.token.load().is_some())
            .finish()
    }
}

#[async_trait]
impl RequestChannel for HttpRequestChannel {
    fn authorize(&self, token: &str) {
        self.token.store(Some(std::sync::Arc::new(token.to_string())));
    }

    async fn discover_connection_address(&self) -> Result<String, TransportError> {
        self.gateway_url(&["gateway", "bot"], true).await
    }

    async fn discover_connection_address_cached(&self) -> Result<String, TransportError> {
        self.gateway_url(&["gateway"], false).await
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        self.token.store(None);
        *self.last_request.lock().await = None;
        Ok(())
    }

    async fn current_application(&self) -> Result<Value, TransportError> {
        self.get(&["oauth2", "applications", "@me"], true).await
    }

    async fn invite(&self, code: &str) -> Result<Value, TransportError> {
        self.get(&["invites", code], true).await
    }

    async fn user(&self, id: &str) -> Result<Value, TransportError> {
        self.get(&["users", id], true).await
    }

    async fn voice_regions(&self) -> Result<Value, TransportError> {
        self.get(&["voice", "regions"], true).await
    }

    async fn webhook(&self, id: &str) -> Result<Value, TransportError> {
        self.get(&["webhooks", id], true).await
    }

    async fn webhook_with_token(&self, id: &str, token: &str) -> Result<Value, TransportError> {
        self.get(&["webhooks", id, token], false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_segments() {
        let channel = HttpRequestChannel::new("http://localhost:3000/api/v10/", &ClientOptions::default()).unwrap();
        let url = channel.endpoint(&["webhooks", "123", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/v10/webhooks/123/a%2Fb");
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(HttpRequestChannel::new("not a url", &ClientOptions::default()).is_err());
        assert!(HttpRequestChannel::new("mailto:someone@example.com", &ClientOptions::default()).is_err());
    }

    #[test]
    fn test_pacing_from_options() {
        let options = ClientOptions {
            request_pacing_offset_seconds: 0.25,
            ..Default::default()
        };
        let channel = HttpRequestChannel::new(DEFAULT_API_BASE, &options).unwrap();
        assert_eq!(channel.pacing(), Duration::from_millis(250));

        let options = ClientOptions {
            request_pacing_offset_seconds: -3.0,
            ..Default::default()
        };
        let channel = HttpRequestChannel::new(DEFAULT_API_BASE, &options).unwrap();
        assert!(channel.pacing().is_zero());
    }
}
