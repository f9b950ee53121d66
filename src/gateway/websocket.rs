//! Persistent gateway connection over WebSocket.
//!
//! # Responsibilities
//! - Open the socket at the resolved address
//! - Answer the server hello with a heartbeat loop and an identify payload
//! - Report heartbeat round trips and the confirmed identity to the client
//! - Resolve `connect` once the READY dispatch arrives
//!
//! # Data Flow
//! ```text
//! connect_async
//!     → writer task (outbound channel → socket)
//!     → reader task (socket → frames)
//!         HELLO         → heartbeat task + IDENTIFY
//!         HEARTBEAT_ACK → GatewaySignals::heartbeat_acknowledged
//!         READY         → GatewaySignals::identity_confirmed, connect resolves
//!         close/error   → status Disconnected
//! ```
//!
//! Resume, payload compression and dispatch of other events are not handled.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::transport::{ConnectionManager, ConnectionStatus, GatewaySession, TransportError};

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// Intents sent on identify (guild events only).
const IDENTIFY_INTENTS: u64 = 1;

/// Heartbeat interval used when the hello carries none.
const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(41_250);

/// Time the writer gets to flush the close frame on destroy.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type GatewayStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Debug, Deserialize)]
struct Frame {
    op: u8,
    #[serde(default)]
    d: Value,
    s: Option<u64>,
    t: Option<String>,
}

/// WebSocket implementation of [`ConnectionManager`].
#[derive(Default)]
pub struct WebSocketManager {
    status: Arc<AtomicU8>,
    active: Mutex<Option<ActiveConnection>>,
}

struct ActiveConnection {
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// State shared by the reader, writer and heartbeat tasks of one connection.
struct Shared {
    status: Arc<AtomicU8>,
    sequence: AtomicU64,
    last_heartbeat: StdMutex<Option<Instant>>,
    heartbeat: StdMutex<Option<JoinHandle<()>>>,
    outbound: mpsc::UnboundedSender<Message>,
    scheduler: Handle,
}

impl WebSocketManager {
    /// Create an idle connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for WebSocketManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketManager")
            .field("status", &self.status())
            .finish()
    }
}

#[async_trait]
impl ConnectionManager for WebSocketManager {
    async fn connect(
        &self,
        address: &str,
        version: u8,
        session: GatewaySession,
    ) -> Result<(), TransportError> {
        self.destroy().await?;

        let url = gateway_url(address, version)?;
        self.set_status(ConnectionStatus::Connecting);
        tracing::info!(url = %url, "Connecting to gateway");

        let (socket, _) = match connect_async(url.as_str()).await {
            Ok(connected) => connected,
            Err(e) => {
                self.set_status(ConnectionStatus::Disconnected);
                return Err(e.into());
            }
        };
        let (mut sink, stream) = socket.split();
        let scheduler = session.scheduler.clone();

        // Claim the slot first so no await sits between spawning and storing.
        let mut slot = self.active.lock().await;

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let writer = scheduler.spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::warn!(error = %e, "Gateway write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let shared = Arc::new(Shared {
            status: Arc::clone(&self.status),
            sequence: AtomicU64::new(0),
            last_heartbeat: StdMutex::new(None),
            heartbeat: StdMutex::new(None),
            outbound,
            scheduler: scheduler.clone(),
        });

        let (ready_tx, ready_rx) = oneshot::channel();
        let reader = scheduler.spawn(read_loop(stream, Arc::clone(&shared), session, ready_tx));

        *slot = Some(ActiveConnection {
            shared,
            reader,
            writer,
        });
        drop(slot);

        let outcome = match ready_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Closed("gateway reader stopped".to_string())),
        };

        if let Err(e) = outcome {
            self.destroy().await?;
            self.set_status(ConnectionStatus::Disconnected);
            return Err(e);
        }

        tracing::info!("Gateway connection ready");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        let active = self.active.lock().await.take();

        if let Some(mut active) = active {
            active.shared.stop_heartbeat();
            active.reader.abort();
            let _ = active.shared.outbound.send(Message::Close(None));
            if tokio::time::timeout(CLOSE_GRACE, &mut active.writer).await.is_err() {
                active.writer.abort();
            }
            tracing::info!("Gateway connection closed");
        }

        self.set_status(ConnectionStatus::Idle);
        Ok(())
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from(self.status.load(Ordering::SeqCst))
    }
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    fn send(&self, payload: Value) -> Result<(), String> {
        self.outbound
            .send(Message::Text(payload.to_string().into()))
            .map_err(|_| "gateway writer stopped".to_string())
    }

    fn beat(&self) -> Result<(), String> {
        *lock(&self.last_heartbeat) = Some(Instant::now());
        let sequence = match self.sequence.load(Ordering::SeqCst) {
            0 => Value::Null,
            seq => json!(seq),
        };
        self.send(json!({ "op": OP_HEARTBEAT, "d": sequence }))
    }

    fn start_heartbeat(self: &Arc<Self>, interval: Duration) {
        let interval = interval.max(Duration::from_millis(1));
        let first = interval.mul_f64(rand::thread_rng().gen_range(0.0..1.0));
        let shared = Arc::clone(self);

        let task = self.scheduler.spawn(async move {
            tokio::time::sleep(first).await;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if shared.beat().is_err() {
                    break;
                }
            }
        });

        if let Some(previous) = lock(&self.heartbeat).replace(task) {
            previous.abort();
        }
    }

    fn stop_heartbeat(&self) {
        if let Some(task) = lock(&self.heartbeat).take() {
            task.abort();
        }
    }
}

async fn read_loop(
    mut stream: GatewayStream,
    shared: Arc<Shared>,
    session: GatewaySession,
    ready_tx: oneshot::Sender<Result<(), TransportError>>,
) {
    let mut ready_tx = Some(ready_tx);

    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Frame>(&text) {
                Ok(frame) => {
                    if let Err(reason) = handle_frame(frame, &shared, &session, &mut ready_tx) {
                        break reason;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring malformed gateway frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                break frame
                    .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                    .unwrap_or_else(|| "closed by remote".to_string());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break e.to_string(),
            None => break "stream ended".to_string(),
        }
    };

    shared.stop_heartbeat();
    shared.set_status(ConnectionStatus::Disconnected);
    tracing::warn!(reason = %reason, "Gateway connection lost");

    if let Some(tx) = ready_tx.take() {
        let _ = tx.send(Err(TransportError::Closed(reason)));
    }
}

fn handle_frame(
    frame: Frame,
    shared: &Arc<Shared>,
    session: &GatewaySession,
    ready_tx: &mut Option<oneshot::Sender<Result<(), TransportError>>>,
) -> Result<(), String> {
    if let Some(sequence) = frame.s {
        shared.sequence.store(sequence, Ordering::SeqCst);
    }

    match frame.op {
        OP_HELLO => {
            let interval = frame
                .d
                .get("heartbeat_interval")
                .and_then(Value::as_u64)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_HEARTBEAT);
            shared.start_heartbeat(interval);
            shared.set_status(ConnectionStatus::Identifying);
            shared.send(identify_payload(session))?;
        }
        OP_HEARTBEAT => shared.beat()?,
        OP_HEARTBEAT_ACK => {
            let sent = lock(&shared.last_heartbeat).take();
            if let Some(sent) = sent {
                let latency = u64::try_from(sent.elapsed().as_millis()).unwrap_or(u64::MAX);
                session.signals.heartbeat_acknowledged(latency);
            }
        }
        OP_DISPATCH if frame.t.as_deref() == Some("READY") => {
            let user = frame.d.get("user").cloned().unwrap_or(Value::Null);
            if let Err(e) = session.signals.identity_confirmed(user) {
                tracing::warn!(error = %e, "Could not install self identity");
            }
            shared.set_status(ConnectionStatus::Ready);
            if let Some(tx) = ready_tx.take() {
                let _ = tx.send(Ok(()));
            }
        }
        OP_DISPATCH => {}
        OP_RECONNECT => return Err("server requested reconnect".to_string()),
        OP_INVALID_SESSION => return Err("session invalidated".to_string()),
        op => tracing::trace!(op, "Unhandled gateway opcode"),
    }

    Ok(())
}

/// Address with protocol version and encoding in the query.
fn gateway_url(address: &str, version: u8) -> Result<Url, TransportError> {
    let mut url = Url::parse(address)?;
    url.query_pairs_mut()
        .clear()
        .append_pair("v", &version.to_string())
        .append_pair("encoding", "json");
    Ok(url)
}

fn identify_payload(session: &GatewaySession) -> Value {
    let options = &session.options;
    let mut data = json!({
        "token": session.token,
        "intents": IDENTIFY_INTENTS,
        "large_threshold": options.large_guild_threshold,
        "compress": false,
        "properties": {
            "os": std::env::consts::OS,
            "browser": "gateway-client",
            "device": "gateway-client",
        },
    });

    if let Some(shard) = options.shard() {
        data["shard"] = json!(shard);
    }
    if let Some(presence) = &options.initial_presence {
        data["presence"] = presence.clone();
    }

    json!({ "op": OP_IDENTIFY, "d": data })
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GatewaySignals;
    use crate::config::ClientOptions;

    fn session(options: ClientOptions) -> GatewaySession {
        GatewaySession {
            token: "secret".to_string(),
            options: Arc::new(options),
            signals: GatewaySignals::detached(),
            scheduler: Handle::current(),
        }
    }

    #[test]
    fn test_gateway_url_sets_version_and_encoding() {
        let url = gateway_url("wss://gateway.example.net", 10).unwrap();
        assert_eq!(url.as_str(), "wss://gateway.example.net/?v=10&encoding=json");

        let url = gateway_url("wss://gateway.example.net/?v=6", 10).unwrap();
        assert_eq!(url.query(), Some("v=10&encoding=json"));
    }

    #[tokio::test]
    async fn test_identify_payload_carries_options() {
        let payload = identify_payload(&session(ClientOptions {
            shard_id: Some(1),
            shard_count: Some(2),
            large_guild_threshold: 75,
            initial_presence: Some(json!({ "status": "idle" })),
            ..Default::default()
        }));

        assert_eq!(payload["op"], json!(OP_IDENTIFY));
        assert_eq!(payload["d"]["token"], json!("secret"));
        assert_eq!(payload["d"]["large_threshold"], json!(75));
        assert_eq!(payload["d"]["shard"], json!([1, 2]));
        assert_eq!(payload["d"]["presence"]["status"], json!("idle"));
    }

    #[tokio::test]
    async fn test_identify_payload_without_sharding() {
        let payload = identify_payload(&session(ClientOptions::default()));
        assert!(payload["d"].get("shard").is_none());
        assert!(payload["d"].get("presence").is_none());
    }

    #[tokio::test]
    async fn test_destroy_without_connection_is_noop() {
        let manager = WebSocketManager::new();
        manager.destroy().await.unwrap();
        manager.destroy().await.unwrap();
        assert_eq!(manager.status(), ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_address_fails() {
        let manager = WebSocketManager::new();
        let result = manager
            .connect("ws://127.0.0.1:1", 10, session(ClientOptions::default()))
            .await;
        assert!(result.is_err());
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }
}
