//! Integration tests for rtsub-ws.
//!
//! These tests run the client against an in-process real-time server:
//! - Handshake and subscription lifecycle
//! - Reconnection and replay
//! - Keep-alive expiry

pub mod common;
