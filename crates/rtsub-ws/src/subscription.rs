//! Subscription registry and multiplexer.
//!
//! Tracks every subscription opened through the client, correlates inbound
//! frames to subscriptions by wire identifier, and prepares replays after a
//! reconnect. The connection machine refers to subscriptions only through
//! [`SubscriptionKey`] and wire identifiers.
//!
//! Each subscription has a stable local key (handed to the caller) and a wire
//! identifier that is freshly generated every time a `start` is issued, so a
//! replayed subscription never reuses an identifier.

use crate::error::SubscriptionError;
use crate::message::{GraphQlError, ProtocolMessage, StartPayload};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Stable local identifier of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey(u64);

impl SubscriptionKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    key: SubscriptionKey,
}

impl SubscriptionHandle {
    pub(crate) fn new(key: SubscriptionKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> SubscriptionKey {
        self.key
    }
}

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Waiting for a connection or for `start_ack`.
    Pending,
    /// Acknowledged by the server on the current connection.
    Active,
    /// `stop` sent, waiting for `complete`.
    Cancelled,
}

/// Event delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// First `start_ack`. Not repeated after reconnects.
    Started,
    /// Event payload pushed by the server.
    Data(Value),
    /// Error scoped to this subscription. See [`SubscriptionError::is_terminal`].
    Error(SubscriptionError),
    /// The subscription has ended.
    Complete,
}

impl SubscriptionEvent {
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Complete => true,
            Self::Error(error) => error.is_terminal(),
            Self::Started | Self::Data(_) => false,
        }
    }
}

/// Result of queueing an event on an [`EventSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Queued,
    /// The subscriber is too far behind; the event was not queued.
    Full,
    /// The subscriber has gone away.
    Closed,
}

/// Non-blocking entry point of a subscriber's event pipeline.
///
/// Backed by a bounded queue with one slot held back for the terminal event,
/// so a subscription can always be ended with an explicit error or
/// completion even when its subscriber has stopped reading.
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<SubscriptionEvent>,
}

impl EventSink {
    /// Sink accepting up to `capacity` non-terminal events ahead of the reader.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SubscriptionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1) + 1);
        (Self { tx }, rx)
    }

    /// Feed `sink` through a dedicated relay task over a `capacity` hand-off.
    ///
    /// The relay awaits capacity on `sink`, so a slow consumer holds back
    /// only its own stream. Once the hand-off is full, [`EventSink::deliver`]
    /// reports [`Push::Full`].
    pub fn relay_to(sink: mpsc::Sender<SubscriptionEvent>, capacity: usize) -> Self {
        let (this, mut rx) = Self::channel(capacity);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                if sink.send(event).await.is_err() {
                    debug!("Subscriber receiver dropped, stopping relay");
                    break;
                }
                if terminal {
                    break;
                }
            }
        });
        this
    }

    /// Queue an event without waiting.
    ///
    /// Non-terminal events never take the last free slot.
    pub fn deliver(&self, event: SubscriptionEvent) -> Push {
        if self.tx.is_closed() {
            return Push::Closed;
        }
        if !event.is_terminal() && self.tx.capacity() <= 1 {
            return Push::Full;
        }
        match self.tx.try_send(event) {
            Ok(()) => Push::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Push::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Push::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A registered subscription.
#[derive(Debug)]
pub struct Subscription {
    pub key: SubscriptionKey,
    /// Wire identifier of the current `start`, if one was issued on this connection.
    pub wire_id: Option<String>,
    /// Query and authorization, preserved across replays.
    pub payload: StartPayload,
    pub status: SubscriptionStatus,
    sink: EventSink,
    /// Whether `Started` has been delivered.
    announced: bool,
}

impl Subscription {
    fn deliver(&self, event: SubscriptionEvent) -> Push {
        self.sink.deliver(event)
    }
}

/// Outcome of routing a `data` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No subscription with this wire identifier.
    Unknown,
    /// Subscription is being cancelled; event dropped.
    Cancelled,
    /// Subscriber went away; the subscription should be cancelled.
    SinkClosed(SubscriptionKey),
    /// Subscriber fell behind; the subscription was ended with
    /// [`SubscriptionError::Overflow`] and `stop` should be sent for `wire_id`.
    Overflow { key: SubscriptionKey, wire_id: String },
}

/// Outcome of routing an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorRouting {
    Unknown,
    /// Delivered to an active subscription, which stays registered.
    NonTerminal(SubscriptionKey),
    /// `start` was rejected; the subscription was removed.
    Rejected(SubscriptionKey),
    /// Error on a subscription being cancelled; it was removed.
    Removed(SubscriptionKey),
    /// Subscriber fell behind; see [`Delivery::Overflow`].
    Overflow { key: SubscriptionKey, wire_id: String },
}

/// Outcome of an unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    NotFound,
    /// Never issued on the current connection; removed without protocol traffic.
    RemovedLocally,
    /// `stop` must be sent for this wire identifier.
    StopRequired(String),
    /// A `stop` is already in flight.
    AlreadyCancelling,
}

/// Subscription registry.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_key: u64,
    subscriptions: HashMap<SubscriptionKey, Subscription>,
    by_wire_id: HashMap<String, SubscriptionKey>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `Pending` subscription.
    pub fn insert(&mut self, payload: StartPayload, sink: EventSink) -> SubscriptionKey {
        self.next_key += 1;
        let key = SubscriptionKey(self.next_key);
        self.subscriptions.insert(
            key,
            Subscription {
                key,
                wire_id: None,
                payload,
                status: SubscriptionStatus::Pending,
                sink,
                announced: false,
            },
        );
        debug!(%key, "Subscription registered");
        key
    }

    /// Issue a `start` for a pending subscription under a fresh wire identifier.
    pub fn issue(&mut self, key: SubscriptionKey) -> Option<(String, ProtocolMessage)> {
        let subscription = self.subscriptions.get_mut(&key)?;
        if subscription.status != SubscriptionStatus::Pending {
            return None;
        }

        if let Some(old) = subscription.wire_id.take() {
            self.by_wire_id.remove(&old);
        }
        let wire_id = Uuid::new_v4().to_string();
        subscription.wire_id = Some(wire_id.clone());
        self.by_wire_id.insert(wire_id.clone(), key);

        let start = ProtocolMessage::Start {
            id: wire_id.clone(),
            payload: subscription.payload.clone(),
        };
        Some((wire_id, start))
    }

    /// Issue every pending subscription. Used on each transition into `Connected`.
    pub fn issue_all_pending(&mut self) -> Vec<(SubscriptionKey, String, ProtocolMessage)> {
        let mut keys: Vec<SubscriptionKey> = self
            .subscriptions
            .values()
            .filter(|s| s.status == SubscriptionStatus::Pending)
            .map(|s| s.key)
            .collect();
        keys.sort();

        keys.into_iter()
            .filter_map(|key| {
                self.issue(key)
                    .map(|(wire_id, start)| (key, wire_id, start))
            })
            .collect()
    }

    /// `start_ack` received: `Pending -> Active`.
    pub fn activate(&mut self, wire_id: &str) -> Option<SubscriptionKey> {
        let key = *self.by_wire_id.get(wire_id)?;
        let subscription = self.subscriptions.get_mut(&key)?;
        if subscription.status != SubscriptionStatus::Pending {
            return None;
        }

        subscription.status = SubscriptionStatus::Active;
        if !subscription.announced {
            subscription.announced = true;
            subscription.deliver(SubscriptionEvent::Started);
        }
        Some(key)
    }

    /// Route a `data` payload.
    pub fn deliver_data(&mut self, wire_id: &str, payload: Value) -> Delivery {
        let Some(subscription) = self.lookup_mut(wire_id) else {
            return Delivery::Unknown;
        };
        if subscription.status == SubscriptionStatus::Cancelled {
            return Delivery::Cancelled;
        }
        let key = subscription.key;
        match subscription.deliver(SubscriptionEvent::Data(payload)) {
            Push::Queued => Delivery::Delivered,
            Push::Closed => Delivery::SinkClosed(key),
            Push::Full => match self.overflow(key) {
                Some(wire_id) => Delivery::Overflow { key, wire_id },
                None => Delivery::SinkClosed(key),
            },
        }
    }

    /// Route an `error` scoped to one subscription.
    pub fn deliver_error(&mut self, wire_id: &str, errors: Vec<GraphQlError>) -> ErrorRouting {
        let Some(subscription) = self.lookup_mut(wire_id) else {
            return ErrorRouting::Unknown;
        };
        let (key, status) = (subscription.key, subscription.status);

        match status {
            SubscriptionStatus::Active => {
                let event = SubscriptionEvent::Error(SubscriptionError::Server(errors));
                if subscription.deliver(event) != Push::Full {
                    return ErrorRouting::NonTerminal(key);
                }
                match self.overflow(key) {
                    Some(wire_id) => ErrorRouting::Overflow { key, wire_id },
                    None => ErrorRouting::NonTerminal(key),
                }
            }
            SubscriptionStatus::Pending => {
                if let Some(removed) = self.remove(key) {
                    removed.deliver(SubscriptionEvent::Error(SubscriptionError::StartRejected(
                        errors,
                    )));
                }
                ErrorRouting::Rejected(key)
            }
            SubscriptionStatus::Cancelled => {
                if let Some(removed) = self.remove(key) {
                    removed.deliver(SubscriptionEvent::Complete);
                }
                ErrorRouting::Removed(key)
            }
        }
    }

    /// `complete` received: remove and signal completion.
    pub fn complete(&mut self, wire_id: &str) -> Option<SubscriptionKey> {
        let key = *self.by_wire_id.get(wire_id)?;
        let removed = self.remove(key)?;
        removed.deliver(SubscriptionEvent::Complete);
        Some(key)
    }

    /// Remove a subscription and deliver a terminal event to it.
    pub fn finish(&mut self, key: SubscriptionKey, event: SubscriptionEvent) -> Option<Subscription> {
        let removed = self.remove(key)?;
        removed.deliver(event);
        Some(removed)
    }

    /// Begin unsubscribing.
    pub fn cancel(&mut self, key: SubscriptionKey) -> CancelOutcome {
        let Some(subscription) = self.subscriptions.get_mut(&key) else {
            return CancelOutcome::NotFound;
        };

        match (subscription.status, subscription.wire_id.clone()) {
            (SubscriptionStatus::Cancelled, _) => CancelOutcome::AlreadyCancelling,
            (_, Some(wire_id)) => {
                subscription.status = SubscriptionStatus::Cancelled;
                CancelOutcome::StopRequired(wire_id)
            }
            (_, None) => {
                self.finish(key, SubscriptionEvent::Complete);
                CancelOutcome::RemovedLocally
            }
        }
    }

    /// Connection lost: every live subscription returns to `Pending` without
    /// notification; subscriptions being cancelled are dropped.
    ///
    /// Returns the number of subscriptions awaiting replay.
    pub fn mark_all_pending(&mut self) -> usize {
        self.by_wire_id.clear();

        let cancelled: Vec<SubscriptionKey> = self
            .subscriptions
            .values()
            .filter(|s| s.status == SubscriptionStatus::Cancelled)
            .map(|s| s.key)
            .collect();
        for key in cancelled {
            if let Some(removed) = self.subscriptions.remove(&key) {
                removed.deliver(SubscriptionEvent::Complete);
            }
        }

        for subscription in self.subscriptions.values_mut() {
            subscription.status = SubscriptionStatus::Pending;
            subscription.wire_id = None;
        }
        self.subscriptions.len()
    }

    /// Deliver one terminal error to every subscription and clear the registry.
    pub fn terminate_all(&mut self, error: SubscriptionError) -> usize {
        self.by_wire_id.clear();
        let count = self.subscriptions.len();
        for (_, subscription) in self.subscriptions.drain() {
            subscription.deliver(SubscriptionEvent::Error(error.clone()));
        }
        count
    }

    pub fn get(&self, key: SubscriptionKey) -> Option<&Subscription> {
        self.subscriptions.get(&key)
    }

    pub fn key_for(&self, wire_id: &str) -> Option<SubscriptionKey> {
        self.by_wire_id.get(wire_id).copied()
    }

    pub fn count_with_status(&self, status: SubscriptionStatus) -> usize {
        self.subscriptions
            .values()
            .filter(|s| s.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// End a subscription whose subscriber cannot keep up. Returns the wire
    /// identifier that still has to be stopped on the server.
    fn overflow(&mut self, key: SubscriptionKey) -> Option<String> {
        let removed = self.remove(key)?;
        removed.deliver(SubscriptionEvent::Error(SubscriptionError::Overflow));
        removed.wire_id
    }

    fn lookup_mut(&mut self, wire_id: &str) -> Option<&mut Subscription> {
        let key = self.by_wire_id.get(wire_id)?;
        self.subscriptions.get_mut(key)
    }

    fn remove(&mut self, key: SubscriptionKey) -> Option<Subscription> {
        let removed = self.subscriptions.remove(&key)?;
        if let Some(wire_id) = &removed.wire_id {
            self.by_wire_id.remove(wire_id);
        }
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SubscriptionRequest;
    use rtsub_core::{AuthMaterial, AuthPayload};
    use serde_json::json;
    use std::collections::HashSet;

    fn payload() -> StartPayload {
        let auth = AuthPayload::from_material("api.example.com", &AuthMaterial::ApiKey("k".into()));
        StartPayload::new(&SubscriptionRequest::new("subscription { s }"), &auth).unwrap()
    }

    fn sink() -> (EventSink, mpsc::Receiver<SubscriptionEvent>) {
        EventSink::channel(16)
    }

    fn drain(rx: &mut mpsc::Receiver<SubscriptionEvent>) -> Vec<SubscriptionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_insert_issue_activate() {
        let mut registry = SubscriptionRegistry::new();
        let (sink, mut rx) = sink();
        let key = registry.insert(payload(), sink);

        let (wire_id, start) = registry.issue(key).unwrap();
        assert_eq!(start.id(), Some(wire_id.as_str()));
        assert_eq!(registry.key_for(&wire_id), Some(key));

        assert_eq!(registry.activate(&wire_id), Some(key));
        assert_eq!(registry.get(key).unwrap().status, SubscriptionStatus::Active);
        assert_eq!(drain(&mut rx), vec![SubscriptionEvent::Started]);
    }

    #[test]
    fn test_keys_are_unique() {
        let mut registry = SubscriptionRegistry::new();
        let keys: HashSet<_> = (0..50)
            .map(|_| registry.insert(payload(), sink().0))
            .collect();
        assert_eq!(keys.len(), 50);
    }

    #[test]
    fn test_data_routing_and_unknown_id() {
        let mut registry = SubscriptionRegistry::new();
        let (sink, mut rx) = sink();
        let key = registry.insert(payload(), sink);
        let (wire_id, _) = registry.issue(key).unwrap();
        registry.activate(&wire_id);

        assert_eq!(
            registry.deliver_data("unknown", json!({"x": 1})),
            Delivery::Unknown
        );
        assert_eq!(
            registry.deliver_data(&wire_id, json!({"x": 2})),
            Delivery::Delivered
        );
        assert_eq!(
            drain(&mut rx),
            vec![
                SubscriptionEvent::Started,
                SubscriptionEvent::Data(json!({"x": 2}))
            ]
        );
    }

    #[test]
    fn test_replay_uses_fresh_ids_and_stays_silent() {
        let mut registry = SubscriptionRegistry::new();
        let (sink, mut rx) = sink();
        let key = registry.insert(payload(), sink);
        let (first_id, _) = registry.issue(key).unwrap();
        registry.activate(&first_id);

        assert_eq!(registry.mark_all_pending(), 1);
        assert_eq!(registry.get(key).unwrap().status, SubscriptionStatus::Pending);
        assert_eq!(registry.key_for(&first_id), None);

        let replayed = registry.issue_all_pending();
        assert_eq!(replayed.len(), 1);
        let second_id = replayed[0].1.clone();
        assert_ne!(first_id, second_id);

        registry.activate(&second_id);
        assert_eq!(drain(&mut rx), vec![SubscriptionEvent::Started]);
    }

    #[test]
    fn test_error_before_ack_is_terminal() {
        let mut registry = SubscriptionRegistry::new();
        let (sink, mut rx) = sink();
        let key = registry.insert(payload(), sink);
        let (wire_id, _) = registry.issue(key).unwrap();

        let routing = registry.deliver_error(&wire_id, vec![GraphQlError::default()]);
        assert_eq!(routing, ErrorRouting::Rejected(key));
        assert!(registry.is_empty());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[test]
    fn test_error_after_ack_is_not_terminal() {
        let mut registry = SubscriptionRegistry::new();
        let (sink, mut rx) = sink();
        let key = registry.insert(payload(), sink);
        let (wire_id, _) = registry.issue(key).unwrap();
        registry.activate(&wire_id);

        let routing = registry.deliver_error(&wire_id, Vec::new());
        assert_eq!(routing, ErrorRouting::NonTerminal(key));
        assert_eq!(registry.len(), 1);
        assert!(!drain(&mut rx)[1].is_terminal());
    }

    #[test]
    fn test_cancel_outcomes() {
        let mut registry = SubscriptionRegistry::new();
        let (sink_a, mut rx_a) = sink();
        let never_issued = registry.insert(payload(), sink_a);
        assert_eq!(registry.cancel(never_issued), CancelOutcome::RemovedLocally);
        assert_eq!(drain(&mut rx_a), vec![SubscriptionEvent::Complete]);

        let issued = registry.insert(payload(), sink().0);
        let (wire_id, _) = registry.issue(issued).unwrap();
        registry.activate(&wire_id);
        assert_eq!(
            registry.cancel(issued),
            CancelOutcome::StopRequired(wire_id.clone())
        );
        assert_eq!(registry.cancel(issued), CancelOutcome::AlreadyCancelling);
        assert_eq!(
            registry.deliver_data(&wire_id, json!(null)),
            Delivery::Cancelled
        );
        assert_eq!(registry.complete(&wire_id), Some(issued));
        assert_eq!(registry.cancel(issued), CancelOutcome::NotFound);
    }

    #[test]
    fn test_connection_loss_drops_cancelling_subscriptions() {
        let mut registry = SubscriptionRegistry::new();
        let (sink, mut rx) = sink();
        let key = registry.insert(payload(), sink);
        let (wire_id, _) = registry.issue(key).unwrap();
        registry.activate(&wire_id);
        registry.cancel(key);

        assert_eq!(registry.mark_all_pending(), 0);
        assert!(registry.is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![SubscriptionEvent::Started, SubscriptionEvent::Complete]
        );
    }

    #[test]
    fn test_terminate_all_delivers_exactly_one_error() {
        let mut registry = SubscriptionRegistry::new();
        let (sink_a, mut rx_a) = sink();
        let (sink_b, mut rx_b) = sink();
        registry.insert(payload(), sink_a);
        registry.insert(payload(), sink_b);

        assert_eq!(
            registry.terminate_all(SubscriptionError::Fatal("rejected".into())),
            2
        );
        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert!(events[0].is_terminal());
        }
    }

    #[tokio::test]
    async fn test_relay_preserves_order_under_backpressure() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::relay_to(tx, 16);

        for i in 0..10 {
            assert_eq!(sink.deliver(SubscriptionEvent::Data(json!(i))), Push::Queued);
        }
        assert_eq!(sink.deliver(SubscriptionEvent::Complete), Push::Queued);

        for i in 0..10 {
            assert_eq!(rx.recv().await, Some(SubscriptionEvent::Data(json!(i))));
        }
        assert_eq!(rx.recv().await, Some(SubscriptionEvent::Complete));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_is_bounded() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::relay_to(tx, 4);

        let mut accepted = 0;
        for i in 0..100_000 {
            match sink.deliver(SubscriptionEvent::Data(json!(i))) {
                Push::Queued => accepted += 1,
                Push::Full => break,
                Push::Closed => panic!("relay stopped early"),
            }
            tokio::task::yield_now().await;
        }
        // Subscriber channel, the event held by the relay, and the hand-off.
        assert!(accepted <= 1 + 1 + 4, "accepted {accepted} events");

        // The reserved slot still takes the terminal event.
        assert_eq!(
            sink.deliver(SubscriptionEvent::Error(SubscriptionError::Overflow)),
            Push::Queued
        );

        let mut received = Vec::new();
        while let Some(event) = rx.recv().await {
            received.push(event);
        }
        assert_eq!(received.len(), accepted + 1);
        assert_eq!(
            received.last(),
            Some(&SubscriptionEvent::Error(SubscriptionError::Overflow))
        );
    }

    #[test]
    fn test_overflow_ends_subscription_with_error() {
        let mut registry = SubscriptionRegistry::new();
        let (sink, mut rx) = EventSink::channel(2);
        let key = registry.insert(payload(), sink);
        let (wire_id, _) = registry.issue(key).unwrap();
        registry.activate(&wire_id);

        assert_eq!(
            registry.deliver_data(&wire_id, json!(1)),
            Delivery::Delivered
        );
        assert_eq!(
            registry.deliver_data(&wire_id, json!(2)),
            Delivery::Overflow {
                key,
                wire_id: wire_id.clone()
            }
        );
        assert!(registry.is_empty());
        assert_eq!(registry.key_for(&wire_id), None);

        assert_eq!(
            drain(&mut rx),
            vec![
                SubscriptionEvent::Started,
                SubscriptionEvent::Data(json!(1)),
                SubscriptionEvent::Error(SubscriptionError::Overflow),
            ]
        );
    }

    #[test]
    fn test_error_overflow_on_full_queue() {
        let mut registry = SubscriptionRegistry::new();
        let (sink, mut rx) = EventSink::channel(1);
        let key = registry.insert(payload(), sink);
        let (wire_id, _) = registry.issue(key).unwrap();
        registry.activate(&wire_id);

        assert_eq!(
            registry.deliver_error(&wire_id, Vec::new()),
            ErrorRouting::Overflow {
                key,
                wire_id: wire_id.clone()
            }
        );
        assert!(registry.is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![
                SubscriptionEvent::Started,
                SubscriptionEvent::Error(SubscriptionError::Overflow),
            ]
        );
    }
}
