//! Core types for the rtsub real-time subscription client.
//!
//! This crate provides the pieces that do not touch the network:
//! - `Endpoint`: API endpoint and its derived real-time endpoint
//! - `CredentialsProvider`: the auth capability consumed by the client
//! - `AuthPayload`: the JSON authorization object sent with handshake and start frames

pub mod auth;
pub mod credentials;
pub mod endpoint;
pub mod error;

pub use auth::AuthPayload;
pub use credentials::{
    AuthMaterial, CredentialsProvider, ExpiringMaterial, SessionCredentials, SessionSource,
    StaticCredentials,
};
pub use endpoint::{api_endpoint, realtime_endpoint, resolve_api, resolve_realtime, Endpoint};
pub use error::{AuthError, EndpointError, Result};
