//! Gateway address resolution.
//!
//! # Responsibilities
//! - Cache the last gateway address obtained from the request channel
//! - Reuse it unless a refresh is forced
//! - Pick the cheap lookup when an address was seen before
//!
//! # Design Decisions
//! - A failed lookup leaves the cache untouched, so the old address stays
//!   usable for a later retry
//! - The cache is lock-free (`ArcSwapOption`); concurrent resolves may both
//!   hit the request channel, the last writer wins

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::observability::metrics;
use crate::transport::{RequestChannel, TransportError};

/// Caching resolver for the persistent connection's address.
#[derive(Debug, Default)]
pub struct GatewayResolver {
    cached: ArcSwapOption<String>,
}

impl GatewayResolver {
    /// Create a resolver with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the gateway address.
    ///
    /// Returns the cached address without any request unless `force` is set
    /// or nothing has been cached yet.
    pub async fn resolve(
        &self,
        requests: &dyn RequestChannel,
        force: bool,
    ) -> Result<String, TransportError> {
        let cached = self.cached.load_full();

        if let Some(address) = cached.as_deref() {
            if !force {
                metrics::record_gateway_resolution("cache");
                tracing::debug!(address = %address, "Reusing cached gateway address");
                return Ok(address.clone());
            }
        }

        let address = if cached.is_some() {
            metrics::record_gateway_resolution("reuse_check");
            requests.discover_connection_address_cached().await?
        } else {
            metrics::record_gateway_resolution("fresh");
            requests.discover_connection_address().await?
        };

        tracing::debug!(address = %address, force, "Resolved gateway address");
        self.cached.store(Some(Arc::new(address.clone())));
        Ok(address)
    }

    /// Last address obtained, if any.
    pub fn cached(&self) -> Option<String> {
        self.cached.load_full().map(|address| address.as_ref().clone())
    }
}
