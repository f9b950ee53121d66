//! Collaborator contracts.
//!
//! # Data Flow
//! ```text
//! Client::login
//!     → GatewayResolver → RequestChannel::discover_connection_address[_cached]
//!     → ConnectionManager::connect(address, version, GatewaySession)
//!         → GatewaySignals (identity confirmed, heartbeat acknowledged)
//!
//! Client::fetch_*
//!     → RequestChannel endpoint (raw JSON)
//!     → record construction in the client
//!
//! Client::destroy / failed login
//!     → RequestChannel::destroy, ConnectionManager::destroy
//! ```
//!
//! # Design Decisions
//! - Collaborators only see command-style access to the client
//!   ([`GatewaySignals`]), never its state
//! - `destroy` on both collaborators must be idempotent
//! - Endpoints return raw JSON; records are built by the caller

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::config::ClientOptions;

pub use crate::client::GatewaySignals;
pub use http::HttpRequestChannel;

/// Errors raised by collaborators.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote service answered with a non-success status.
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// WebSocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Payload was not the expected JSON.
    #[error("invalid payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Address could not be parsed.
    #[error("invalid address: {0}")]
    Address(#[from] url::ParseError),

    /// Connection went away before the operation finished.
    #[error("connection closed: {0}")]
    Closed(String),

    /// Remote service refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(Box::new(e))
    }
}

/// Status of the persistent connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle = 0,
    Connecting = 1,
    Identifying = 2,
    Ready = 3,
    Disconnected = 4,
}

impl From<u8> for ConnectionStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectionStatus::Connecting,
            2 => ConnectionStatus::Identifying,
            3 => ConnectionStatus::Ready,
            4 => ConnectionStatus::Disconnected,
            _ => ConnectionStatus::Idle,
        }
    }
}

/// Everything a connection manager needs for one connect attempt.
#[derive(Clone)]
pub struct GatewaySession {
    /// Authentication token of this login.
    pub token: String,
    /// Validated client options.
    pub options: Arc<ClientOptions>,
    /// Command-style access back into the client.
    pub signals: GatewaySignals,
    /// Scheduler the client was built with; connection tasks spawn here.
    pub scheduler: Handle,
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("token", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

/// Manager of the persistent gateway connection.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Open the connection and resolve once it is fully ready.
    async fn connect(
        &self,
        address: &str,
        version: u8,
        session: GatewaySession,
    ) -> Result<(), TransportError>;

    /// Close the connection. Must be a no-op when already closed.
    async fn destroy(&self) -> Result<(), TransportError>;

    /// Current connection status.
    fn status(&self) -> ConnectionStatus;
}

/// Manager of the request/response channel.
#[async_trait]
pub trait RequestChannel: Send + Sync {
    /// Install the token used for authenticated requests.
    fn authorize(&self, token: &str);

    /// Obtain a gateway address through a full, authenticated lookup.
    async fn discover_connection_address(&self) -> Result<String, TransportError>;

    /// Obtain a gateway address when one was seen before; may take a cheaper path.
    async fn discover_connection_address_cached(&self) -> Result<String, TransportError>;

    /// Release resources held by the channel. Must be idempotent.
    async fn destroy(&self) -> Result<(), TransportError>;

    async fn current_application(&self) -> Result<Value, TransportError>;

    async fn invite(&self, code: &str) -> Result<Value, TransportError>;

    async fn user(&self, id: &str) -> Result<Value, TransportError>;

    async fn voice_regions(&self) -> Result<Value, TransportError>;

    async fn webhook(&self, id: &str) -> Result<Value, TransportError>;

    async fn webhook_with_token(&self, id: &str, token: &str) -> Result<Value, TransportError>;
}
