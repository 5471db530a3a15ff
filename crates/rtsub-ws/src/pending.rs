//! Outstanding protocol acknowledgments.
//!
//! Correlates `connection_init`, `start` and `stop` frames with the inbound
//! `connection_ack`, `start_ack` and `complete`. Entries are removed on ack,
//! on timeout, or when the connection goes away.

use crate::error::{RealtimeError, RealtimeResult};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// What an acknowledgment is awaited for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AckKey {
    /// `connection_init` awaiting `connection_ack`.
    ConnectionInit,
    /// `start` awaiting `start_ack`.
    Start(String),
    /// `stop` awaiting `complete`.
    Stop(String),
}

/// Caller waiting on the outcome of an acknowledgment.
pub type AckWaiter = oneshot::Sender<RealtimeResult<()>>;

/// A single outstanding acknowledgment.
#[derive(Debug)]
pub struct PendingAck {
    pub deadline: Instant,
    pub timeout: Duration,
    waiter: Option<AckWaiter>,
}

impl PendingAck {
    /// Notify the waiter, if any. A dropped waiter is ignored.
    pub fn complete(self, result: RealtimeResult<()>) {
        if let Some(waiter) = self.waiter {
            let _ = waiter.send(result);
        }
    }
}

/// Store of outstanding acknowledgments, owned by the connection machine.
#[derive(Debug, Default)]
pub struct PendingAcks {
    acks: HashMap<AckKey, PendingAck>,
}

impl PendingAcks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for `key`, failing any previous waiter on the same key.
    pub fn insert(&mut self, key: AckKey, timeout: Duration, now: Instant, waiter: Option<AckWaiter>) {
        let pending = PendingAck {
            deadline: now + timeout,
            timeout,
            waiter,
        };
        if let Some(previous) = self.acks.insert(key, pending) {
            previous.complete(Err(RealtimeError::ConnectionClosed));
        }
    }

    /// Acknowledgment received: remove and notify success.
    ///
    /// Returns `true` if the key was outstanding.
    pub fn resolve(&mut self, key: &AckKey) -> bool {
        match self.acks.remove(key) {
            Some(pending) => {
                pending.complete(Ok(()));
                true
            }
            None => false,
        }
    }

    /// Remove without notifying.
    pub fn remove(&mut self, key: &AckKey) -> Option<PendingAck> {
        self.acks.remove(key)
    }

    pub fn contains(&self, key: &AckKey) -> bool {
        self.acks.contains_key(key)
    }

    /// Remove and return every entry whose deadline has passed.
    pub fn take_expired(&mut self, now: Instant) -> Vec<(AckKey, PendingAck)> {
        let expired: Vec<AckKey> = self
            .acks
            .iter()
            .filter(|(_, pending)| now >= pending.deadline)
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| self.acks.remove_entry(&key))
            .collect()
    }

    /// Earliest deadline among outstanding entries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.acks.values().map(|pending| pending.deadline).min()
    }

    /// Remove every entry and return them for the caller to settle.
    pub fn drain(&mut self) -> Vec<(AckKey, PendingAck)> {
        self.acks.drain().collect()
    }

    /// Fail every waiter with a connection-closed error.
    pub fn fail_all(&mut self) {
        for (_, pending) in self.acks.drain() {
            pending.complete(Err(RealtimeError::ConnectionClosed));
        }
    }

    pub fn len(&self) -> usize {
        self.acks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_resolve() {
        let mut acks = PendingAcks::new();
        let (tx, mut rx) = oneshot::channel();
        let now = Instant::now();

        acks.insert(AckKey::Stop("a".into()), Duration::from_secs(1), now, Some(tx));
        assert!(acks.contains(&AckKey::Stop("a".into())));

        assert!(acks.resolve(&AckKey::Stop("a".into())));
        assert!(acks.is_empty());
        assert!(matches!(rx.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn test_resolve_unknown() {
        let mut acks = PendingAcks::new();
        assert!(!acks.resolve(&AckKey::Start("missing".into())));
    }

    #[test]
    fn test_take_expired_and_next_deadline() {
        let mut acks = PendingAcks::new();
        let now = Instant::now();
        acks.insert(AckKey::ConnectionInit, Duration::from_secs(1), now, None);
        acks.insert(AckKey::Start("b".into()), Duration::from_secs(5), now, None);

        assert_eq!(acks.next_deadline(), Some(now + Duration::from_secs(1)));

        let expired = acks.take_expired(now + Duration::from_secs(2));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, AckKey::ConnectionInit);
        assert_eq!(acks.len(), 1);
        assert_eq!(acks.next_deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_fail_all_notifies_waiters() {
        let mut acks = PendingAcks::new();
        let (tx, mut rx) = oneshot::channel();
        acks.insert(
            AckKey::Stop("c".into()),
            Duration::from_secs(1),
            Instant::now(),
            Some(tx),
        );

        acks.fail_all();
        assert!(acks.is_empty());
        assert!(matches!(
            rx.try_recv(),
            Ok(Err(RealtimeError::ConnectionClosed))
        ));
    }
}
