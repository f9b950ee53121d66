//! Client orchestrator.
//!
//! # Data Flow
//! ```text
//! ClientBuilder::build
//!     → validate options (nothing constructed on failure)
//!     → request channel, connection manager, stores, timer registry
//!     → BackgroundTasks::start(scheduler)
//!
//! Client::login(token, force)
//!     → Resolving: GatewayResolver::resolve
//!     → Connecting: ConnectionManager::connect
//!     → Ready: ready_at set, "ready" emitted
//!     ↳ failure: requests.destroy → connection.destroy → timers.cancel_all
//!                → background shutdown → Idle, original error returned
//!
//! Client::destroy(stop_background)
//!     → epoch bumped (in-flight login drops its pending step)
//!     → waits for that login to let go of the bootstrap
//!     → same teardown, background only when asked → Idle
//! ```
//!
//! # Design Decisions
//! - One login at a time; a second login is rejected while the first runs
//! - State lives behind a short-lived mutex that is never held across `.await`
//! - Collaborators get [`GatewaySignals`] rather than the state itself

mod bootstrap;
mod builder;
mod fetch;
mod signals;
mod state;

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::config::ClientOptions;
use crate::error::{ClientError, DecodeError};
use crate::events::EventSink;
use crate::gateway::GatewayResolver;
use crate::lifecycle::BackgroundTasks;
use crate::models::{Channel, ClientUser, Emoji, Guild, Presence, User};
use crate::observability::LatencyTracker;
use crate::storage::Store;
use crate::timers::{TimerHandle, TimerRegistry};
use crate::transport::{ConnectionManager, ConnectionStatus, RequestChannel};

pub use builder::ClientBuilder;
pub use fetch::OAUTH_AUTHORIZE_URL;
pub use signals::GatewaySignals;
pub use state::Phase;

use state::ClientState;

/// Protocol version requested from the gateway.
pub const GATEWAY_VERSION: u8 = 10;

/// Handle to a client. Cheap to clone; all clones share one client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

/// Non-owning handle to a client.
#[derive(Clone, Default)]
pub struct WeakClient {
    inner: Weak<ClientInner>,
}

impl WeakClient {
    /// Get the client back if it is still alive.
    pub fn upgrade(&self) -> Option<Client> {
        self.inner.upgrade().map(|inner| Client { inner })
    }
}

pub(crate) struct ClientInner {
    options: Arc<ClientOptions>,
    requests: Arc<dyn RequestChannel>,
    connection: Arc<dyn ConnectionManager>,
    events: Arc<dyn EventSink>,

    channels: Store<Channel>,
    emojis: Store<Emoji>,
    guilds: Store<Guild>,
    presences: Store<Presence>,
    users: Store<User>,

    timers: TimerRegistry,
    latency: LatencyTracker,
    background: BackgroundTasks,
    resolver: GatewayResolver,

    state: Mutex<ClientState>,
    /// Bumped by every destroy; a login compares it to detect being overtaken.
    epoch: watch::Sender<u64>,
    /// Held by a login for its whole bootstrap; destroy takes it before tearing down.
    bootstrap: AsyncMutex<()>,
}

impl ClientInner {
    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_client_user(&self, raw: Value) -> Result<Arc<ClientUser>, ClientError> {
        let me: ClientUser =
            serde_json::from_value(raw).map_err(|e| DecodeError::new("client user", &e))?;
        let me = Arc::new(me);
        self.users.set(Arc::new(me.user.clone()));

        let previous = self.state().user.replace(Arc::clone(&me));
        if previous.is_some() {
            tracing::debug!(user_id = %me.id(), "Self identity resynced");
        } else {
            tracing::info!(user_id = %me.id(), "Self identity confirmed");
        }
        Ok(me)
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.timers.cancel_all();
    }
}

impl Client {
    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Handle that does not keep the client alive.
    pub fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Validated options; immutable for the client's lifetime.
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Token of the last login attempt.
    pub fn token(&self) -> Option<String> {
        self.inner.state().token.clone()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.inner.state().phase
    }

    /// When the current session became ready; `None` unless ready.
    pub fn ready_at(&self) -> Option<SystemTime> {
        self.inner.state().ready_at
    }

    /// Check if the last login completed and no destroy followed.
    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// Identity the client is logged in as.
    pub fn user(&self) -> Option<Arc<ClientUser>> {
        self.inner.state().user.clone()
    }

    /// Average heartbeat round trip in milliseconds, `None` without samples.
    pub fn ping(&self) -> Option<u64> {
        self.inner.latency.average()
    }

    /// Status reported by the connection manager.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.connection.status()
    }

    /// Last gateway address obtained, if any.
    pub fn gateway_address(&self) -> Option<String> {
        self.inner.resolver.cached()
    }

    /// Cached channels.
    pub fn channels(&self) -> &Store<Channel> {
        &self.inner.channels
    }

    /// Cached emojis.
    pub fn emojis(&self) -> &Store<Emoji> {
        &self.inner.emojis
    }

    /// Cached guilds.
    pub fn guilds(&self) -> &Store<Guild> {
        &self.inner.guilds
    }

    /// Cached presences.
    pub fn presences(&self) -> &Store<Presence> {
        &self.inner.presences
    }

    /// Cached users, including the client's own identity.
    pub fn users(&self) -> &Store<User> {
        &self.inner.users
    }

    /// Names of the background tasks declared at construction.
    pub fn background_tasks(&self) -> Vec<String> {
        self.inner.background.names()
    }

    /// Run `callback` once after `delay`. Cancelled by [`Client::destroy`].
    pub fn schedule_once<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce(&Client) + Send + 'static,
    {
        let handle = self.inner.timers.schedule_once(
            Arc::downgrade(&self.inner),
            delay,
            move |inner| callback(&Client { inner }),
        );
        tracing::debug!(timer_id = %handle.id(), ?delay, "Scheduled timer");
        handle
    }

    /// Run `callback` every `interval`. Cancelled by [`Client::destroy`].
    pub fn schedule_periodic<F>(&self, interval: Duration, mut callback: F) -> TimerHandle
    where
        F: FnMut(&Client) + Send + 'static,
    {
        let handle = self.inner.timers.schedule_periodic(
            Arc::downgrade(&self.inner),
            interval,
            move |inner| callback(&Client { inner }),
        );
        tracing::debug!(timer_id = %handle.id(), ?interval, "Scheduled periodic timer");
        handle
    }

    /// Cancel a timer. Cancelling an unknown or finished timer is a no-op.
    pub fn cancel_timer(&self, handle: &TimerHandle) -> bool {
        self.inner.timers.cancel(handle)
    }

    /// Number of timers the client still owns.
    pub fn active_timers(&self) -> usize {
        self.inner.timers.len()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("phase", &self.phase())
            .field("connection", &self.connection_status())
            .field("timers", &self.active_timers())
            .finish()
    }
}
