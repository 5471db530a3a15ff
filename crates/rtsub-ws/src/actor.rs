//! Async driver for the connection state machine.
//!
//! A single task owns the [`Machine`] and consumes one bounded input queue
//! (facade commands, transport events, timer ticks) in arrival order. Each
//! transport runs as two tasks: a reader forwarding frames into the input
//! queue and a writer draining an unbounded outbound channel, so a slow
//! socket never stalls the receive path.

use crate::connection::{ConnectionStatus, Effect, Input, Machine};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// WebSocket subprotocol spoken by the real-time endpoint.
pub const SUBPROTOCOL: &str = "graphql-ws";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The live transport, identified by its generation.
struct TransportHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub(crate) struct Actor {
    machine: Machine,
    inputs: mpsc::Receiver<Input>,
    /// Cloned into transport tasks.
    input_tx: mpsc::Sender<Input>,
    status: watch::Sender<ConnectionStatus>,
    shutdown: CancellationToken,
    transport: Option<TransportHandle>,
}

impl Actor {
    pub(crate) fn new(
        machine: Machine,
        inputs: mpsc::Receiver<Input>,
        input_tx: mpsc::Sender<Input>,
        status: watch::Sender<ConnectionStatus>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            machine,
            inputs,
            input_tx,
            status,
            shutdown,
            transport: None,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(endpoint = %self.machine.endpoint(), "Real-time client started");

        loop {
            let deadline = self.machine.next_deadline();
            let input = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => Input::Close { reply: None },
                input = self.inputs.recv() => match input {
                    Some(input) => input,
                    None => Input::Close { reply: None },
                },
                () = sleep_until(deadline) => Input::Tick,
            };

            let effects = self.machine.handle(input, Instant::now());
            for effect in effects {
                self.apply(effect);
            }

            if self.machine.is_closed() {
                break;
            }
        }

        self.transport = None;
        info!("Real-time client stopped");
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport { generation, url } => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let cancel = self.shutdown.child_token();
                tokio::spawn(run_transport(
                    generation,
                    url,
                    outbound_rx,
                    self.input_tx.clone(),
                    cancel.clone(),
                ));
                // Replacing the handle cancels any previous transport.
                self.transport = Some(TransportHandle {
                    generation,
                    outbound: outbound_tx,
                    cancel,
                });
            }
            Effect::Send(text) => match &self.transport {
                Some(transport) => {
                    if transport.outbound.send(Message::Text(text)).is_err() {
                        debug!(
                            generation = transport.generation,
                            "Writer gone, frame dropped"
                        );
                    }
                }
                None => debug!("No transport, frame dropped"),
            },
            Effect::CloseTransport => {
                if let Some(transport) = self.transport.take() {
                    debug!(generation = transport.generation, "Closing transport");
                }
            }
            Effect::Status(status) => {
                self.status.send_replace(status);
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Connect, then pump frames until the transport ends or is cancelled.
async fn run_transport(
    generation: u64,
    url: Url,
    outbound: mpsc::UnboundedReceiver<Message>,
    inputs: mpsc::Sender<Input>,
    cancel: CancellationToken,
) {
    let ws = tokio::select! {
        () = cancel.cancelled() => return,
        result = connect(&url) => match result {
            Ok(ws) => ws,
            Err(e) => {
                warn!(generation, error = %e, "WebSocket connect failed");
                let _ = inputs
                    .send(Input::TransportFailed { generation, reason: e.to_string() })
                    .await;
                return;
            }
        },
    };

    debug!(generation, "WebSocket connected");
    if inputs.send(Input::TransportOpened { generation }).await.is_err() {
        return;
    }

    let (write, read) = ws.split();
    tokio::spawn(write_frames(generation, write, outbound, cancel.clone()));
    read_frames(generation, read, inputs, cancel).await;
}

async fn connect(url: &Url) -> Result<WsStream, tokio_tungstenite::tungstenite::Error> {
    let mut request = url.as_str().into_client_request()?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));

    // TCP_NODELAY: frames are small and latency-sensitive.
    let (ws, _response) = connect_async_tls_with_config(request, None, true, None).await?;
    Ok(ws)
}

async fn read_frames(
    generation: u64,
    mut read: SplitStream<WsStream>,
    inputs: mpsc::Sender<Input>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = read.next() => {
                let closed = match frame {
                    Some(Ok(Message::Text(text))) => {
                        if inputs.send(Input::Frame { generation, text }).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        warn!(generation, code, %reason, "WebSocket closed by server");
                        (code, reason)
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(generation, error = %e, "WebSocket read error");
                        (1006, e.to_string())
                    }
                    None => (1006, "stream ended".to_string()),
                };

                let (code, reason) = closed;
                let _ = inputs
                    .send(Input::TransportClosed { generation, code, reason })
                    .await;
                break;
            }
        }
    }
}

async fn write_frames(
    generation: u64,
    mut write: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Flush what was queued before the close was requested.
                while let Ok(message) = outbound.try_recv() {
                    if write.send(message).await.is_err() {
                        break;
                    }
                }
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(generation, error = %e, "Failed to send Close frame");
                }
                break;
            }
            message = outbound.recv() => match message {
                Some(message) => {
                    if let Err(e) = write.send(message).await {
                        warn!(generation, error = %e, "WebSocket write failed");
                        break;
                    }
                }
                None => break,
            },
        }
    }
}
