//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Handle;

use gateway_client::client::ClientBuilder;
use gateway_client::events::{ClientEvent, EventSink};
use gateway_client::lifecycle::{BackgroundTask, Teardown};
use gateway_client::transport::{
    ConnectionManager, ConnectionStatus, GatewaySession, RequestChannel, TransportError,
};
use gateway_client::Client;

/// Ordered record of collaborator calls, shared by the mocks of one test.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

/// Request channel with canned answers.
pub struct MockRequests {
    log: CallLog,
    pub address: String,
    pub fail_discovery: AtomicBool,
    pub authorized: Mutex<Option<String>>,
    pub responses: Mutex<HashMap<&'static str, Value>>,
    pub lookups: Mutex<Vec<String>>,
}

impl MockRequests {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            address: "wss://gateway.test".to_string(),
            fail_discovery: AtomicBool::new(false),
            authorized: Mutex::new(None),
            responses: Mutex::new(HashMap::new()),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, endpoint: &'static str, body: Value) {
        self.responses.lock().unwrap().insert(endpoint, body);
    }

    fn answer(&self, endpoint: &'static str, key: String) -> Result<Value, TransportError> {
        self.log.push("requests.fetch");
        self.lookups.lock().unwrap().push(key);
        self.responses
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                endpoint: endpoint.to_string(),
                status: 404,
            })
    }

    fn discovery(&self) -> Result<String, TransportError> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            Err(TransportError::Status {
                endpoint: "/gateway/bot".to_string(),
                status: 503,
            })
        } else {
            Ok(self.address.clone())
        }
    }
}

#[async_trait]
impl RequestChannel for MockRequests {
    fn authorize(&self, token: &str) {
        *self.authorized.lock().unwrap() = Some(token.to_string());
    }

    async fn discover_connection_address(&self) -> Result<String, TransportError> {
        self.log.push("requests.discover");
        self.discovery()
    }

    async fn discover_connection_address_cached(&self) -> Result<String, TransportError> {
        self.log.push("requests.discover_cached");
        self.discovery()
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        self.log.push("requests.destroy");
        Ok(())
    }

    async fn current_application(&self) -> Result<Value, TransportError> {
        self.answer("application", String::new())
    }

    async fn invite(&self, code: &str) -> Result<Value, TransportError> {
        self.answer("invite", code.to_string())
    }

    async fn user(&self, id: &str) -> Result<Value, TransportError> {
        self.answer("user", id.to_string())
    }

    async fn voice_regions(&self) -> Result<Value, TransportError> {
        self.answer("voice_regions", String::new())
    }

    async fn webhook(&self, id: &str) -> Result<Value, TransportError> {
        self.answer("webhook", id.to_string())
    }

    async fn webhook_with_token(&self, id: &str, token: &str) -> Result<Value, TransportError> {
        self.answer("webhook_with_token", format!("{}/{}", id, token))
    }
}

/// What the mock connection does on `connect`.
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    Fail,
    Hang,
    /// Confirm this identity and one heartbeat of the given latency, then succeed.
    Identify(Value, u64),
}

pub struct MockConnection {
    log: CallLog,
    pub behavior: Mutex<Behavior>,
    pub connected_to: Mutex<Vec<(String, u8)>>,
    pub fail_teardown: AtomicBool,
    status: AtomicU8,
}

impl MockConnection {
    pub fn new(log: CallLog, behavior: Behavior) -> Self {
        Self {
            log,
            behavior: Mutex::new(behavior),
            connected_to: Mutex::new(Vec::new()),
            fail_teardown: AtomicBool::new(false),
            status: AtomicU8::new(ConnectionStatus::Idle as u8),
        }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl ConnectionManager for MockConnection {
    async fn connect(
        &self,
        address: &str,
        version: u8,
        session: GatewaySession,
    ) -> Result<(), TransportError> {
        self.log.push("connection.connect");
        self.connected_to
            .lock()
            .unwrap()
            .push((address.to_string(), version));
        self.status
            .store(ConnectionStatus::Connecting as u8, Ordering::SeqCst);

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Succeed => {}
            Behavior::Fail => {
                self.status
                    .store(ConnectionStatus::Disconnected as u8, Ordering::SeqCst);
                return Err(TransportError::Closed("4004 authentication failed".to_string()));
            }
            Behavior::Hang => std::future::pending::<()>().await,
            Behavior::Identify(user, latency) => {
                session.signals.heartbeat_acknowledged(latency);
                session
                    .signals
                    .identity_confirmed(user)
                    .map_err(|e| TransportError::Rejected(e.to_string()))?;
            }
        }

        self.status
            .store(ConnectionStatus::Ready as u8, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        self.log.push("connection.destroy");
        self.status.store(ConnectionStatus::Idle as u8, Ordering::SeqCst);
        if self.fail_teardown.load(Ordering::SeqCst) {
            return Err(TransportError::Closed("already gone".to_string()));
        }
        Ok(())
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from(self.status.load(Ordering::SeqCst))
    }
}

/// Event sink remembering every emitted event.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ClientEvent>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(ClientEvent::name).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ClientEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Background task counting its lifecycle calls.
#[derive(Default)]
pub struct CountingTask {
    pub started: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl BackgroundTask for CountingTask {
    fn name(&self) -> &str {
        "counting"
    }

    fn set_scheduler(&self, _scheduler: Handle) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn teardown(&self) -> Teardown {
        Teardown::Shutdown
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// A client wired to mocks.
pub struct Harness {
    pub log: CallLog,
    pub requests: Arc<MockRequests>,
    pub connection: Arc<MockConnection>,
    pub events: Arc<RecordingSink>,
    pub task: Arc<CountingTask>,
}

impl Harness {
    pub fn new(behavior: Behavior) -> Self {
        let log = CallLog::default();
        Self {
            requests: Arc::new(MockRequests::new(log.clone())),
            connection: Arc::new(MockConnection::new(log.clone(), behavior)),
            events: Arc::new(RecordingSink::default()),
            task: Arc::new(CountingTask::default()),
            log,
        }
    }

    pub fn builder(&self) -> ClientBuilder {
        Client::builder()
            .request_channel(self.requests.clone())
            .connection_manager(self.connection.clone())
            .events(self.events.clone())
            .background_task(self.task.clone())
    }

    pub fn client(&self) -> Client {
        self.builder().build().unwrap()
    }
}

/// Request line and authorization header seen by the programmable backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

/// Start a programmable HTTP backend on a free port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let authorization = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| value.trim().to_string());

    Some(RecordedRequest {
        method,
        path,
        authorization,
    })
}
