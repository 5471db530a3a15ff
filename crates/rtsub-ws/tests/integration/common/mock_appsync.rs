//! Mock real-time server for integration tests.
//!
//! Speaks enough of the protocol to drive the client:
//! - Answers `connection_init` with `connection_ack` (or `connection_error`)
//! - Answers `start` with `start_ack` and `stop` with `complete`
//! - Records every received frame
//! - Lets tests push frames or drop live connections

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

/// Server behavior.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// `connectionTimeoutMs` advertised in `connection_ack`.
    pub connection_timeout_ms: u64,
    /// Answer every `connection_init` with the same `connection_error`.
    pub reject_init: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 300_000,
            reject_init: false,
        }
    }
}

enum Control {
    Frame(Value),
    Drop,
}

#[derive(Default)]
struct Shared {
    received: Vec<Value>,
    protocols: Vec<Option<String>>,
    paths: Vec<String>,
    connections: Vec<mpsc::UnboundedSender<Control>>,
}

/// A mock real-time server.
pub struct MockAppSyncServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    shared: Arc<Mutex<Shared>>,
}

impl MockAppSyncServer {
    pub async fn start() -> Self {
        Self::start_with(MockConfig::default()).await
    }

    /// Start on an available port.
    pub async fn start_with(config: MockConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let shared_clone = shared.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(stream, shared_clone.clone(), config.clone()));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            shared,
        }
    }

    /// Real-time URL of the server.
    pub fn url(&self) -> String {
        format!("ws://{}/graphql", self.addr)
    }

    /// Custom-domain style API URL; the client derives `/graphql/realtime`.
    pub fn api_url(&self) -> String {
        format!("http://{}/graphql", self.addr)
    }

    /// Request path of each accepted connection.
    pub async fn paths(&self) -> Vec<String> {
        self.shared.lock().await.paths.clone()
    }

    /// Number of accepted WebSocket connections.
    pub async fn connection_count(&self) -> usize {
        self.shared.lock().await.connections.len()
    }

    /// `Sec-WebSocket-Protocol` offered by each connection.
    pub async fn protocols(&self) -> Vec<Option<String>> {
        self.shared.lock().await.protocols.clone()
    }

    /// Received frames of the given `type`, in arrival order.
    pub async fn received(&self, message_type: &str) -> Vec<Value> {
        self.shared
            .lock()
            .await
            .received
            .iter()
            .filter(|frame| frame["type"] == message_type)
            .cloned()
            .collect()
    }

    /// Wait until at least `count` frames of `message_type` have arrived.
    pub async fn wait_for(&self, message_type: &str, count: usize) -> Vec<Value> {
        let result = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let frames = self.received(message_type).await;
                if frames.len() >= count {
                    return frames;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        result.unwrap_or_else(|_| panic!("Timed out waiting for {count} {message_type} frames"))
    }

    /// Wait until at least `count` connections have been accepted.
    pub async fn wait_for_connections(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.connection_count().await < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for {count} connections"));
    }

    /// Send a frame on the most recent connection.
    pub async fn send(&self, frame: Value) {
        let shared = self.shared.lock().await;
        let latest = shared.connections.last().expect("no connection");
        let _ = latest.send(Control::Frame(frame));
    }

    /// Abruptly drop every live connection.
    pub async fn drop_connections(&self) {
        for connection in &self.shared.lock().await.connections {
            let _ = connection.send(Control::Drop);
        }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

fn echo_subprotocol(request: &Request, mut response: Response) -> Result<Response, ErrorResponse> {
    if let Some(protocol) = request.headers().get("Sec-WebSocket-Protocol") {
        response
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", protocol.clone());
    }
    Ok(response)
}

async fn handle_connection(stream: TcpStream, shared: Arc<Mutex<Shared>>, config: MockConfig) {
    let mut offered = None;
    let mut path = String::new();
    let ws_stream = match accept_hdr_async(stream, |request: &Request, response: Response| {
        offered = request
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        path = request.uri().path().to_string();
        echo_subprotocol(request, response)
    })
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    {
        let mut shared = shared.lock().await;
        shared.protocols.push(offered);
        shared.paths.push(path);
        shared.connections.push(control_tx);
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            control = control_rx.recv() => match control {
                Some(Control::Frame(frame)) => {
                    let _ = write.send(Message::Text(frame.to_string())).await;
                }
                Some(Control::Drop) | None => break,
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    shared.lock().await.received.push(frame.clone());

                    if let Some(reply) = respond(&frame, &config) {
                        let _ = write.send(Message::Text(reply.to_string())).await;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
        }
    }
}

fn respond(frame: &Value, config: &MockConfig) -> Option<Value> {
    let id = frame["id"].clone();
    match frame["type"].as_str()? {
        "connection_init" if config.reject_init => Some(json!({
            "type": "connection_error",
            "payload": {"errors": [{"errorType": "UnauthorizedException", "errorCode": 401}]}
        })),
        "connection_init" => Some(json!({
            "type": "connection_ack",
            "payload": {"connectionTimeoutMs": config.connection_timeout_ms}
        })),
        "start" => Some(json!({"type": "start_ack", "id": id})),
        "stop" => Some(json!({"type": "complete", "id": id})),
        _ => None,
    }
}
