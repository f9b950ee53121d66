//! Orchestrator state.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::models::ClientUser;

/// Phase of the login/destroy state machine.
///
/// ```text
/// Idle → Resolving → Connecting → Ready
///          │             │
///          └─── failure ─┴──→ Idle
/// any ──→ Destroying ──→ Idle
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Resolving,
    Connecting,
    Ready,
    Destroying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Resolving => "resolving",
            Phase::Connecting => "connecting",
            Phase::Ready => "ready",
            Phase::Destroying => "destroying",
        };
        f.write_str(name)
    }
}

/// Mutable top-level state, owned by the client.
#[derive(Debug, Default)]
pub(crate) struct ClientState {
    pub phase: Phase,
    /// Last token passed to a login that got past the precondition checks.
    pub token: Option<String>,
    /// Set once per successful bootstrap, cleared by destroy.
    pub ready_at: Option<SystemTime>,
    pub user: Option<Arc<ClientUser>>,
}

impl ClientState {
    /// Forget everything a bootstrap produced. The token is kept.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.ready_at = None;
        self.user = None;
    }
}
