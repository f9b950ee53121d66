//! Client construction.

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::client::{Client, ClientInner};
use crate::config::{options_from_map, validate_client_options, ClientOptions};
use crate::error::{ClientError, ClientResult};
use crate::events::{EventSink, NullSink};
use crate::gateway::{GatewayResolver, WebSocketManager};
use crate::lifecycle::{BackgroundTask, BackgroundTasks};
use crate::observability::LatencyTracker;
use crate::storage::Store;
use crate::timers::TimerRegistry;
use crate::transport::http::DEFAULT_API_BASE;
use crate::transport::{ConnectionManager, HttpRequestChannel, RequestChannel};

enum OptionsSource {
    Map(Map<String, Value>),
    Typed(ClientOptions),
}

/// Builder for [`Client`].
///
/// Collaborators left unset fall back to the bundled HTTP request channel,
/// the WebSocket connection manager and a sink that drops every event.
pub struct ClientBuilder {
    options: OptionsSource,
    requests: Option<Arc<dyn RequestChannel>>,
    connection: Option<Arc<dyn ConnectionManager>>,
    events: Option<Arc<dyn EventSink>>,
    background: Vec<Arc<dyn BackgroundTask>>,
    scheduler: Option<Handle>,
    api_base: String,
}

impl ClientBuilder {
    /// Start from default options and the bundled collaborators.
    pub fn new() -> Self {
        Self {
            options: OptionsSource::Typed(ClientOptions::default()),
            requests: None,
            connection: None,
            events: None,
            background: Vec::new(),
            scheduler: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Options as a configuration map; unknown keys are ignored.
    pub fn options_map(mut self, options: Map<String, Value>) -> Self {
        self.options = OptionsSource::Map(options);
        self
    }

    /// Typed options; validated by `build`.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = OptionsSource::Typed(options);
        self
    }

    /// Replace the bundled HTTP request channel.
    pub fn request_channel(mut self, requests: Arc<dyn RequestChannel>) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Replace the bundled WebSocket connection manager.
    pub fn connection_manager(mut self, connection: Arc<dyn ConnectionManager>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Sink receiving `ready` and `error` events.
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Declare a background task. Tasks are started once, by `build`.
    pub fn background_task(mut self, task: Arc<dyn BackgroundTask>) -> Self {
        self.background.push(task);
        self
    }

    /// Runtime timers, background tasks and gateway connection tasks are
    /// spawned on. Defaults to the runtime `build` is called from.
    pub fn scheduler(mut self, scheduler: Handle) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Base URL for the bundled request channel.
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Validate the options, then construct the client and start its
    /// background tasks. Nothing is constructed when validation fails.
    pub fn build(self) -> ClientResult<Client> {
        let options = match self.options {
            OptionsSource::Map(map) => options_from_map(&map)?,
            OptionsSource::Typed(options) => {
                validate_client_options(&options)?;
                options
            }
        };

        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Handle::try_current().map_err(|_| ClientError::NoScheduler)?,
        };

        let options = Arc::new(options);

        let requests: Arc<dyn RequestChannel> = match self.requests {
            Some(requests) => requests,
            None => Arc::new(
                HttpRequestChannel::new(&self.api_base, &options).map_err(ClientError::Request)?,
            ),
        };
        let connection: Arc<dyn ConnectionManager> = match self.connection {
            Some(connection) => connection,
            None => Arc::new(WebSocketManager::new()),
        };
        let events: Arc<dyn EventSink> = match self.events {
            Some(events) => events,
            None => Arc::new(NullSink),
        };

        let background = BackgroundTasks::new(self.background);
        let (epoch, _) = watch::channel(0);

        let inner = Arc::new(ClientInner {
            options: Arc::clone(&options),
            requests,
            connection,
            events,
            channels: Store::new(),
            emojis: Store::new(),
            guilds: Store::new(),
            presences: Store::new(),
            users: Store::new(),
            timers: TimerRegistry::new(scheduler.clone()),
            latency: LatencyTracker::new(),
            background: background.clone(),
            resolver: GatewayResolver::new(),
            state: Mutex::default(),
            epoch,
            bootstrap: AsyncMutex::new(()),
        });

        background.start(&scheduler);

        tracing::info!(
            shard = ?options.shard(),
            background_tasks = background.len(),
            "Client constructed"
        );

        Ok(Client { inner })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
