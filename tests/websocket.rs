//! Bundled WebSocket connection manager against a scripted gateway.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use gateway_client::client::Phase;
use gateway_client::transport::ConnectionStatus;
use gateway_client::{Client, ClientError};

mod common;
use common::{CallLog, MockRequests};

#[derive(Default)]
struct Gateway {
    uri: Mutex<Option<String>>,
    frames: Mutex<Vec<Value>>,
}

impl Gateway {
    fn identify(&self) -> Option<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .find(|frame| frame["op"] == json!(2))
            .cloned()
    }
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

/// Scripted gateway: hello, READY after identify, ack for every heartbeat.
/// With `reject` set it closes the socket right after the hello instead.
async fn start_gateway(gateway: Arc<Gateway>, reject: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                let recorder = gateway.clone();
                let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    *recorder.uri.lock().unwrap() = Some(request.uri().to_string());
                    Ok(response)
                };
                let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
                    return;
                };

                let hello = json!({ "op": 10, "d": { "heartbeat_interval": 20 } });
                if ws.send(text(hello)).await.is_err() {
                    return;
                }
                if reject {
                    let _ = ws.close(None).await;
                    return;
                }

                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(raw) = message else {
                        continue;
                    };
                    let Ok(frame) = serde_json::from_str::<Value>(&raw) else {
                        continue;
                    };
                    gateway.frames.lock().unwrap().push(frame.clone());

                    let reply = match frame["op"].as_u64() {
                        Some(2) => json!({
                            "op": 0,
                            "t": "READY",
                            "s": 1,
                            "d": { "user": { "id": "77", "username": "gateway-bot", "bot": true } },
                        }),
                        Some(1) => json!({ "op": 11 }),
                        _ => continue,
                    };
                    if ws.send(text(reply)).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    format!("ws://{}", addr)
}

fn client_for(address: String) -> (Client, CallLog) {
    let log = CallLog::default();
    let mut requests = MockRequests::new(log.clone());
    requests.address = address;

    let client = Client::builder()
        .request_channel(Arc::new(requests))
        .build()
        .unwrap();
    (client, log)
}

#[tokio::test]
async fn test_login_over_websocket() {
    let gateway = Arc::new(Gateway::default());
    let address = start_gateway(gateway.clone(), false).await;
    let (client, _log) = client_for(address);

    client.login("secret", false).await.unwrap();

    assert_eq!(client.phase(), Phase::Ready);
    assert_eq!(client.connection_status(), ConnectionStatus::Ready);
    assert_eq!(gateway.uri.lock().unwrap().as_deref(), Some("/?v=10&encoding=json"));

    let me = client.user().expect("identity from READY");
    assert_eq!(me.id(), "77");
    assert!(client.users().has("77"));

    let identify = gateway.identify().expect("identify sent");
    assert_eq!(identify["d"]["token"], json!("secret"));
    assert_eq!(identify["d"]["large_threshold"], json!(250));
    assert!(identify["d"].get("shard").is_none());

    tokio::time::timeout(Duration::from_secs(2), async {
        while client.ping().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no heartbeat acknowledged");

    client.destroy(true).await;
    assert_eq!(client.connection_status(), ConnectionStatus::Idle);
    assert!(client.user().is_none());
}

#[tokio::test]
async fn test_close_before_ready_fails_login() {
    let gateway = Arc::new(Gateway::default());
    let address = start_gateway(gateway, true).await;
    let (client, log) = client_for(address);

    let err = client.login("secret", false).await.unwrap_err();

    assert!(matches!(err, ClientError::Bootstrap(_)));
    assert_eq!(client.phase(), Phase::Idle);
    assert_eq!(client.connection_status(), ConnectionStatus::Idle);
    assert_eq!(log.count("requests.destroy"), 1);
}

#[tokio::test]
async fn test_connection_tasks_run_on_client_scheduler() {
    let gateway = Arc::new(Gateway::default());
    let address = start_gateway(gateway, false).await;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();

    let mut requests = MockRequests::new(CallLog::default());
    requests.address = address;
    let client = Client::builder()
        .request_channel(Arc::new(requests))
        .scheduler(runtime.handle().clone())
        .build()
        .unwrap();
    assert_eq!(runtime.metrics().num_alive_tasks(), 0);

    client.login("secret", false).await.unwrap();

    // reader and writer at least, heartbeat once the hello arrived
    assert!(runtime.metrics().num_alive_tasks() >= 2);

    client.destroy(true).await;
    runtime.shutdown_background();
}
