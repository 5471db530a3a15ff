//! Real-time GraphQL subscription client.
//!
//! Opens many concurrent subscriptions over one multiplexed WebSocket
//! connection to an AppSync-style real-time endpoint:
//! - Endpoint derivation and `connection_init` handshake
//! - Keep-alive liveness detection (`ka` frames, interval from `connection_ack`)
//! - Automatic reconnection with exponential backoff and jitter
//! - Transparent re-subscription with fresh identifiers after every reconnect
//! - Per-subscription event streams that never block each other

mod actor;
pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod keepalive;
pub mod message;
pub mod pending;
pub mod subscription;

pub use actor::SUBPROTOCOL;
pub use backoff::{calculate_backoff, Backoff, BackoffConfig};
pub use client::RealtimeClient;
pub use config::ClientConfig;
pub use connection::{ConnectionState, ConnectionStatus, Effect, Input, Machine};
pub use error::{
    CodecError, ConnectionError, HandshakeError, RealtimeError, RealtimeResult, SubscriptionError,
};
pub use keepalive::KeepAliveMonitor;
pub use message::{
    decode, encode, ConnectionAckPayload, ErrorPayload, GraphQlError, ProtocolMessage,
    StartPayload, SubscriptionRequest,
};
pub use pending::{AckKey, PendingAcks};
pub use subscription::{
    EventSink, Push, SubscriptionEvent, SubscriptionHandle, SubscriptionKey, SubscriptionRegistry,
    SubscriptionStatus,
};
