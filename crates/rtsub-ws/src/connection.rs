//! Connection state machine.
//!
//! Owns the connection lifecycle, the keep-alive monitor, outstanding
//! acknowledgments and the subscription registry. It performs no I/O: every
//! call to [`Machine::handle`] consumes one [`Input`] and returns the
//! [`Effect`]s the driver must carry out. All timers are expressed as a single
//! [`Machine::next_deadline`] at which the driver feeds [`Input::Tick`].
//!
//! State transitions:
//!
//! ```text
//! Disconnected --Open--> Connecting --TransportOpened--> Handshaking
//! Handshaking --connection_ack--> Connected (pending subscriptions replayed)
//! Handshaking --rejected / timeout / malformed--> Reconnecting
//! Connected --transport closed / keep-alive timeout / error--> Reconnecting
//! Reconnecting --backoff elapsed--> Connecting
//! any --Close--> Closed
//! ```

use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::error::{
    ConnectionError, HandshakeError, RealtimeError, RealtimeResult, SubscriptionError,
};
use crate::keepalive::KeepAliveMonitor;
use crate::message::{decode, encode, ErrorPayload, ProtocolMessage, StartPayload};
use crate::pending::{AckKey, AckWaiter, PendingAcks};
use crate::subscription::{
    CancelOutcome, Delivery, ErrorRouting, EventSink, SubscriptionEvent, SubscriptionKey,
    SubscriptionRegistry,
};
use chrono::{DateTime, Utc};
use rtsub_core::{AuthPayload, CredentialsProvider, Endpoint};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
    Reconnecting,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Snapshot published on the status stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Most recent connection-level error, cleared on `connection_ack`.
    pub error: Option<String>,
    /// When `state` was entered.
    pub since: DateTime<Utc>,
}

impl ConnectionStatus {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            error: None,
            since: Utc::now(),
        }
    }
}

/// Everything the machine reacts to.
#[derive(Debug)]
pub enum Input {
    /// Open the connection (from `Disconnected`).
    Open,
    /// Reopen immediately, e.g. after credentials were refreshed.
    Reopen,
    Subscribe {
        payload: StartPayload,
        sink: EventSink,
        reply: oneshot::Sender<RealtimeResult<SubscriptionKey>>,
    },
    Unsubscribe {
        key: SubscriptionKey,
        reply: AckWaiter,
    },
    Close {
        reply: Option<oneshot::Sender<()>>,
    },
    TransportOpened {
        generation: u64,
    },
    TransportFailed {
        generation: u64,
        reason: String,
    },
    Frame {
        generation: u64,
        text: String,
    },
    TransportClosed {
        generation: u64,
        code: u16,
        reason: String,
    },
    /// A deadline returned by [`Machine::next_deadline`] has passed.
    Tick,
}

/// Side effects requested by the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a new transport; events from it carry `generation`.
    OpenTransport { generation: u64, url: Url },
    /// Send a text frame on the current transport.
    Send(String),
    /// Close the current transport.
    CloseTransport,
    /// Publish a status change.
    Status(ConnectionStatus),
}

/// Consecutive identical handshake rejections.
#[derive(Debug, Default)]
struct RejectionTracker {
    last: Option<String>,
    count: u32,
}

impl RejectionTracker {
    fn record(&mut self, reason: &str) -> u32 {
        if self.last.as_deref() == Some(reason) {
            self.count += 1;
        } else {
            self.last = Some(reason.to_string());
            self.count = 1;
        }
        self.count
    }

    fn reset(&mut self) {
        self.last = None;
        self.count = 0;
    }
}

/// The connection state machine.
pub struct Machine {
    config: ClientConfig,
    endpoint: Endpoint,
    credentials: Arc<dyn CredentialsProvider>,
    state: ConnectionState,
    last_error: Option<String>,
    since: DateTime<Utc>,
    /// Generation of the current transport. Events carrying another value are stale.
    generation: u64,
    keep_alive: KeepAliveMonitor,
    backoff: Backoff,
    reconnect_at: Option<Instant>,
    rejections: RejectionTracker,
    registry: SubscriptionRegistry,
    pending: PendingAcks,
}

impl Machine {
    /// Validate the configuration and resolve the endpoint pair.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> RealtimeResult<Self> {
        config.validate()?;
        let endpoint = Endpoint::new(&config.endpoint)?;

        Ok(Self {
            keep_alive: KeepAliveMonitor::new(
                config.default_keep_alive(),
                config.keep_alive_multiplier,
            ),
            backoff: Backoff::new(config.backoff()),
            config,
            endpoint,
            credentials,
            state: ConnectionState::Disconnected,
            last_error: None,
            since: Utc::now(),
            generation: 0,
            reconnect_at: None,
            rejections: RejectionTracker::default(),
            registry: SubscriptionRegistry::new(),
            pending: PendingAcks::new(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            error: self.last_error.clone(),
            since: self.since,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn pending_acks(&self) -> &PendingAcks {
        &self.pending
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Earliest instant at which [`Input::Tick`] must be delivered.
    pub fn next_deadline(&self) -> Option<Instant> {
        let keep_alive = match self.state {
            ConnectionState::Connected => self.keep_alive.deadline(),
            _ => None,
        };
        [self.pending.next_deadline(), keep_alive, self.reconnect_at]
            .into_iter()
            .flatten()
            .min()
    }

    /// Process one input.
    pub fn handle(&mut self, input: Input, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        match input {
            Input::Open => {
                if self.state == ConnectionState::Disconnected {
                    self.begin_connect(now, &mut effects);
                }
            }
            Input::Reopen => self.reopen(now, &mut effects),
            Input::Subscribe {
                payload,
                sink,
                reply,
            } => self.subscribe(payload, sink, reply, now, &mut effects),
            Input::Unsubscribe { key, reply } => self.unsubscribe(key, reply, now, &mut effects),
            Input::Close { reply } => {
                self.close(&mut effects);
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            Input::TransportOpened { generation } => {
                if self.is_current(generation) && self.state == ConnectionState::Connecting {
                    self.start_handshake(now, &mut effects);
                }
            }
            Input::TransportFailed { generation, reason } => {
                if self.is_current(generation) && self.state == ConnectionState::Connecting {
                    self.handshake_failed(HandshakeError::TransportOpen(reason), now, &mut effects);
                }
            }
            Input::Frame { generation, text } => {
                if self.is_current(generation) {
                    self.on_frame(&text, now, &mut effects);
                }
            }
            Input::TransportClosed {
                generation,
                code,
                reason,
            } => {
                if self.is_current(generation) {
                    self.on_transport_closed(code, reason, now, &mut effects);
                }
            }
            Input::Tick => self.on_tick(now, &mut effects),
        }

        effects
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    fn is_current(&self, generation: u64) -> bool {
        if generation != self.generation {
            trace!(
                generation,
                current = self.generation,
                "Ignoring event from superseded transport"
            );
            return false;
        }
        !self.is_closed()
    }

    fn transition(&mut self, state: ConnectionState, effects: &mut Vec<Effect>) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Connection state change");
            self.state = state;
            self.since = Utc::now();
        }
        effects.push(Effect::Status(self.status()));
    }

    fn begin_connect(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        self.generation += 1;
        self.reconnect_at = None;
        info!(
            generation = self.generation,
            url = %self.endpoint.websocket(),
            attempt = self.backoff.attempt(),
            "Opening real-time connection"
        );

        // The handshake timeout also bounds opening the transport.
        self.pending.insert(
            AckKey::ConnectionInit,
            self.config.handshake_timeout(),
            now,
            None,
        );
        self.transition(ConnectionState::Connecting, effects);
        effects.push(Effect::OpenTransport {
            generation: self.generation,
            url: self.endpoint.websocket(),
        });
    }

    fn reopen(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                self.backoff.reset();
                self.begin_connect(now, effects);
            }
            state => debug!(%state, "Reopen ignored"),
        }
    }

    fn start_handshake(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let material = match self.credentials.current() {
            Ok(material) => material,
            Err(e) => {
                warn!(error = %e, "Credentials unavailable, connection parked until refreshed");
                self.pending.remove(&AckKey::ConnectionInit);
                self.last_error = Some(RealtimeError::Auth(e).to_string());
                effects.push(Effect::CloseTransport);
                self.transition(ConnectionState::Disconnected, effects);
                return;
            }
        };

        let auth = AuthPayload::from_material(self.endpoint.host(), &material);
        if !self.send(&ProtocolMessage::connection_init(auth), effects) {
            self.handshake_failed(
                HandshakeError::Malformed("connection_init could not be encoded".to_string()),
                now,
                effects,
            );
            return;
        }

        self.pending.insert(
            AckKey::ConnectionInit,
            self.config.handshake_timeout(),
            now,
            None,
        );
        self.transition(ConnectionState::Handshaking, effects);
    }

    fn on_connection_ack(
        &mut self,
        interval: Option<std::time::Duration>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        self.pending.remove(&AckKey::ConnectionInit);
        self.backoff.reset();
        self.rejections.reset();
        self.last_error = None;
        self.keep_alive.arm(interval, now);
        self.transition(ConnectionState::Connected, effects);

        let replays = self.registry.issue_all_pending();
        info!(
            generation = self.generation,
            subscriptions = replays.len(),
            "Connection established"
        );
        for (key, wire_id, start) in replays {
            debug!(%key, wire_id = %wire_id, "Issuing start");
            self.send(&start, effects);
            self.pending.insert(
                AckKey::Start(wire_id),
                self.config.start_ack_timeout(),
                now,
                None,
            );
        }
    }

    fn handshake_rejected(&mut self, reason: String, now: Instant, effects: &mut Vec<Effect>) {
        let count = self.rejections.record(&reason);
        if count >= self.config.max_identical_rejections {
            self.fatal(
                format!("connection rejected {count} times in a row: {reason}"),
                effects,
            );
        } else {
            self.handshake_failed(HandshakeError::Rejected(reason), now, effects);
        }
    }

    fn handshake_failed(&mut self, error: HandshakeError, now: Instant, effects: &mut Vec<Effect>) {
        warn!(error = %error, generation = self.generation, "Handshake failed");
        if !matches!(error, HandshakeError::Rejected(_)) {
            self.rejections.reset();
        }
        self.pending.remove(&AckKey::ConnectionInit);
        self.last_error = Some(error.to_string());
        effects.push(Effect::CloseTransport);
        self.schedule_reconnect(now, effects);
    }

    /// Leave `Connected` without notifying subscribers.
    fn lose_connection(&mut self, error: ConnectionError, now: Instant, effects: &mut Vec<Effect>) {
        warn!(error = %error, generation = self.generation, "Connection lost");
        self.keep_alive.disarm();
        self.last_error = Some(error.to_string());

        for (key, pending) in self.pending.drain() {
            // Subscriptions being cancelled are dropped below; their waiters succeed.
            match key {
                AckKey::Stop(_) => pending.complete(Ok(())),
                AckKey::ConnectionInit | AckKey::Start(_) => {}
            }
        }
        let awaiting_replay = self.registry.mark_all_pending();
        debug!(awaiting_replay, "Subscriptions returned to pending");

        effects.push(Effect::CloseTransport);
        self.schedule_reconnect(now, effects);
    }

    fn schedule_reconnect(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let delay = self.backoff.next_delay();
        self.reconnect_at = Some(now + delay);
        info!(
            attempt = self.backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
        self.transition(ConnectionState::Reconnecting, effects);
    }

    /// Unrecoverable failure: every subscription ends with one terminal error.
    fn fatal(&mut self, reason: String, effects: &mut Vec<Effect>) {
        error!(reason = %reason, "Fatal connection failure, giving up");
        self.shutdown(SubscriptionError::Fatal(reason.clone()), Some(reason), effects);
    }

    fn close(&mut self, effects: &mut Vec<Effect>) {
        if self.is_closed() {
            return;
        }
        info!(
            subscriptions = self.registry.len(),
            "Closing real-time client"
        );
        self.shutdown(
            SubscriptionError::ConnectionClosed("client closed".to_string()),
            None,
            effects,
        );
    }

    fn shutdown(
        &mut self,
        error: SubscriptionError,
        reason: Option<String>,
        effects: &mut Vec<Effect>,
    ) {
        self.generation += 1;
        self.reconnect_at = None;
        self.keep_alive.disarm();
        self.pending.fail_all();
        self.registry.terminate_all(error);
        if reason.is_some() {
            self.last_error = reason;
        }
        effects.push(Effect::CloseTransport);
        self.transition(ConnectionState::Closed, effects);
    }

    // ------------------------------------------------------------------------
    // Facade commands
    // ------------------------------------------------------------------------

    fn subscribe(
        &mut self,
        payload: StartPayload,
        sink: EventSink,
        reply: oneshot::Sender<RealtimeResult<SubscriptionKey>>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if self.is_closed() {
            let _ = reply.send(Err(RealtimeError::ConnectionClosed));
            return;
        }

        let key = self.registry.insert(payload, sink);
        if self.state == ConnectionState::Connected {
            self.issue(key, now, effects);
        }
        let _ = reply.send(Ok(key));
    }

    fn issue(&mut self, key: SubscriptionKey, now: Instant, effects: &mut Vec<Effect>) {
        if let Some((wire_id, start)) = self.registry.issue(key) {
            debug!(%key, wire_id = %wire_id, "Issuing start");
            self.send(&start, effects);
            self.pending.insert(
                AckKey::Start(wire_id),
                self.config.start_ack_timeout(),
                now,
                None,
            );
        }
    }

    fn unsubscribe(
        &mut self,
        key: SubscriptionKey,
        reply: AckWaiter,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        self.cancel(key, Some(reply), now, effects);
    }

    fn cancel(
        &mut self,
        key: SubscriptionKey,
        reply: Option<AckWaiter>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match self.registry.cancel(key) {
            CancelOutcome::StopRequired(wire_id) => {
                self.pending.remove(&AckKey::Start(wire_id.clone()));
                if self.state == ConnectionState::Connected {
                    debug!(%key, wire_id = %wire_id, "Sending stop");
                    self.send(&ProtocolMessage::stop(wire_id.clone()), effects);
                    self.pending.insert(
                        AckKey::Stop(wire_id),
                        self.config.stop_ack_timeout(),
                        now,
                        reply,
                    );
                } else {
                    self.registry.finish(key, SubscriptionEvent::Complete);
                    if let Some(reply) = reply {
                        let _ = reply.send(Ok(()));
                    }
                }
            }
            outcome => {
                debug!(%key, ?outcome, "Unsubscribe resolved locally");
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    fn on_transport_closed(
        &mut self,
        code: u16,
        reason: String,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Handshaking => {
                self.handshake_failed(
                    HandshakeError::TransportOpen(format!(
                        "closed during handshake: code={code}, reason={reason}"
                    )),
                    now,
                    effects,
                );
            }
            ConnectionState::Connected => {
                self.lose_connection(ConnectionError::TransportClosed { code, reason }, now, effects);
            }
            _ => {}
        }
    }

    fn on_frame(&mut self, text: &str, now: Instant, effects: &mut Vec<Effect>) {
        // Any frame, even one that fails to decode, proves liveness.
        self.keep_alive.record_activity(now);

        let message = match decode(text) {
            Ok(message) => message,
            Err(e) => {
                if self.state == ConnectionState::Handshaking && e.is_handshake_critical() {
                    self.handshake_failed(HandshakeError::Malformed(e.to_string()), now, effects);
                } else {
                    warn!(error = %e, "Dropping undecodable frame");
                }
                return;
            }
        };
        trace!(message_type = message.message_type(), "Frame received");

        match (self.state, message) {
            (ConnectionState::Handshaking, ProtocolMessage::ConnectionAck { payload }) => {
                self.on_connection_ack(payload.keep_alive_interval(), now, effects);
            }
            (
                ConnectionState::Handshaking,
                ProtocolMessage::ConnectionError { payload }
                | ProtocolMessage::Error { id: None, payload },
            ) => {
                self.handshake_rejected(payload.summary(), now, effects);
            }
            (
                ConnectionState::Connected,
                ProtocolMessage::ConnectionError { payload }
                | ProtocolMessage::Error { id: None, payload },
            ) => {
                self.lose_connection(ConnectionError::Server(payload.summary()), now, effects);
            }
            (_, ProtocolMessage::KeepAlive {}) => {}
            (ConnectionState::Connected, message) => self.on_subscription_frame(message, now, effects),
            (state, message) => {
                debug!(%state, message_type = message.message_type(), "Ignoring frame");
            }
        }
    }

    fn on_subscription_frame(
        &mut self,
        message: ProtocolMessage,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match message {
            ProtocolMessage::StartAck { id } => {
                self.pending.remove(&AckKey::Start(id.clone()));
                match self.registry.activate(&id) {
                    Some(key) => debug!(%key, wire_id = %id, "Subscription active"),
                    None => debug!(wire_id = %id, "start_ack for unknown or inactive subscription"),
                }
            }
            ProtocolMessage::Data { id, payload } => match self.registry.deliver_data(&id, payload) {
                Delivery::Delivered => {}
                Delivery::Unknown => warn!(wire_id = %id, "Dropping data for unknown subscription"),
                Delivery::Cancelled => debug!(wire_id = %id, "Dropping data for cancelled subscription"),
                Delivery::SinkClosed(key) => {
                    info!(%key, "Subscriber went away, cancelling subscription");
                    self.cancel(key, None, now, effects);
                }
                Delivery::Overflow { key, wire_id } => self.stop_overflowed(key, wire_id, effects),
            },
            ProtocolMessage::Error {
                id: Some(id),
                payload,
            } => self.on_subscription_error(id, payload, effects),
            ProtocolMessage::Complete { id } => {
                self.pending.remove(&AckKey::Start(id.clone()));
                match self.registry.complete(&id) {
                    Some(key) => debug!(%key, wire_id = %id, "Subscription complete"),
                    None => debug!(wire_id = %id, "complete for unknown subscription"),
                }
                self.pending.resolve(&AckKey::Stop(id));
            }
            ProtocolMessage::ConnectionAck { .. } => debug!("Duplicate connection_ack ignored"),
            other => warn!(
                message_type = other.message_type(),
                "Unexpected client-bound frame from server"
            ),
        }
    }

    fn on_subscription_error(&mut self, id: String, payload: ErrorPayload, effects: &mut Vec<Effect>) {
        let summary = payload.summary();
        match self.registry.deliver_error(&id, payload.errors) {
            ErrorRouting::NonTerminal(key) => {
                warn!(%key, error = %summary, "Subscription error");
            }
            ErrorRouting::Rejected(key) => {
                warn!(%key, error = %summary, "Subscription rejected");
                self.pending.remove(&AckKey::Start(id));
            }
            ErrorRouting::Removed(key) => {
                debug!(%key, error = %summary, "Error while cancelling, subscription removed");
                self.pending.resolve(&AckKey::Stop(id));
            }
            ErrorRouting::Overflow { key, wire_id } => self.stop_overflowed(key, wire_id, effects),
            ErrorRouting::Unknown => {
                warn!(wire_id = %id, error = %summary, "Error for unknown subscription");
            }
        }
    }

    /// The subscription is already gone locally; only the server side remains.
    fn stop_overflowed(&mut self, key: SubscriptionKey, wire_id: String, effects: &mut Vec<Effect>) {
        warn!(%key, wire_id = %wire_id, "Subscriber fell behind, ending subscription");
        self.pending.remove(&AckKey::Start(wire_id.clone()));
        self.send(&ProtocolMessage::stop(wire_id), effects);
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    fn on_tick(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        for (key, pending) in self.pending.take_expired(now) {
            match key {
                AckKey::ConnectionInit => {
                    if matches!(
                        self.state,
                        ConnectionState::Connecting | ConnectionState::Handshaking
                    ) {
                        self.handshake_failed(HandshakeError::Timeout(pending.timeout), now, effects);
                    }
                }
                AckKey::Start(wire_id) => {
                    if let Some(sub_key) = self.registry.key_for(&wire_id) {
                        warn!(key = %sub_key, wire_id = %wire_id, "start_ack timed out");
                        if self.state == ConnectionState::Connected {
                            self.send(&ProtocolMessage::stop(wire_id), effects);
                        }
                        self.registry.finish(
                            sub_key,
                            SubscriptionEvent::Error(SubscriptionError::StartTimeout(
                                pending.timeout,
                            )),
                        );
                    }
                }
                AckKey::Stop(wire_id) => {
                    if let Some(sub_key) = self.registry.key_for(&wire_id) {
                        warn!(
                            key = %sub_key,
                            wire_id = %wire_id,
                            "complete not received after stop, removing locally"
                        );
                        self.registry.finish(sub_key, SubscriptionEvent::Complete);
                    }
                    pending.complete(Ok(()));
                }
            }
        }

        if self.state == ConnectionState::Connected && self.keep_alive.is_expired(now) {
            let silence = self.keep_alive.timeout().unwrap_or_default();
            self.lose_connection(ConnectionError::KeepAliveTimeout(silence), now, effects);
        }

        if self.state == ConnectionState::Reconnecting
            && self.reconnect_at.is_some_and(|at| now >= at)
        {
            self.begin_connect(now, effects);
        }
    }

    fn send(&self, message: &ProtocolMessage, effects: &mut Vec<Effect>) -> bool {
        match encode(message) {
            Ok(text) => {
                effects.push(Effect::Send(text));
                true
            }
            Err(e) => {
                error!(error = %e, message_type = message.message_type(), "Failed to encode frame");
                false
            }
        }
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("subscriptions", &self.registry.len())
            .field("pending_acks", &self.pending.len())
            .finish()
    }
}
