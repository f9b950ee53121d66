//! Command-style access for the connection manager.

use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::client::ClientInner;
use crate::error::ClientError;
use crate::models::ClientUser;

/// Signals a connection manager may send back into the client.
///
/// Holds a weak reference; signals sent after the client is dropped are ignored.
#[derive(Clone)]
pub struct GatewaySignals {
    client: Weak<ClientInner>,
}

impl GatewaySignals {
    pub(crate) fn new(client: &Arc<ClientInner>) -> Self {
        Self {
            client: Arc::downgrade(client),
        }
    }

    /// Signals bound to no client.
    pub fn detached() -> Self {
        Self { client: Weak::new() }
    }

    /// The remote service confirmed who we are; install the self identity.
    ///
    /// A second confirmation before the next destroy replaces the record.
    pub fn identity_confirmed(&self, raw: Value) -> Result<Arc<ClientUser>, ClientError> {
        match self.client.upgrade() {
            Some(client) => client.set_client_user(raw),
            None => Err(ClientError::Destroyed),
        }
    }

    /// A heartbeat round trip completed.
    pub fn heartbeat_acknowledged(&self, latency_ms: u64) {
        if let Some(client) = self.client.upgrade() {
            client.latency.record(latency_ms);
        }
    }
}

impl std::fmt::Debug for GatewaySignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySignals")
            .field("attached", &(self.client.strong_count() > 0))
            .finish()
    }
}
