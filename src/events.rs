//! Client event signalling.
//!
//! # Responsibilities
//! - Define the signals the client emits (`ready`, `error`)
//! - Decouple emission from delivery through an injected [`EventSink`]
//!
//! Latency updates are not signalled; they only change the average ping.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::ClientError;

/// Signal emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A bootstrap completed; emitted once per successful login.
    Ready,
    /// A fetch operation failed while building its result.
    Error(Arc<ClientError>),
}

impl ClientEvent {
    /// Event name as seen by subscribers.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Ready => "ready",
            ClientEvent::Error(_) => "error",
        }
    }
}

/// Receiver of client signals.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ClientEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, event: ClientEvent) {
        tracing::trace!(event = event.name(), "Dropping event");
    }
}

/// Sink fanning events out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ClientEvent>,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: ClientEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            tracing::debug!(event = name, "No subscriber for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let sink = BroadcastSink::new(4);
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();

        sink.emit(ClientEvent::Ready);

        assert_eq!(first.recv().await.unwrap().name(), "ready");
        assert_eq!(second.recv().await.unwrap().name(), "ready");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let sink = BroadcastSink::default();
        sink.emit(ClientEvent::Error(Arc::new(ClientError::Destroyed)));
        NullSink.emit(ClientEvent::Ready);
    }
}
