//! Credentials capability consumed by the real-time client.
//!
//! The client never acquires or signs credentials itself. It asks a
//! [`CredentialsProvider`] for the current material when it builds a
//! `connection_init` or `start` frame, and asks it to fetch fresh material
//! only when the caller requests a credentials refresh.
//!
//! Session-backed credentials are composed explicitly: a narrow
//! [`SessionSource`] supplies expiring material, and the
//! [`SessionCredentials`] adapter turns it into a provider that reports
//! expiry as [`AuthError::SessionExpired`].

use crate::error::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

/// Authorization material understood by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMaterial {
    /// API key sent as `x-api-key`.
    ApiKey(String),
    /// Bearer token (OIDC / user pool JWT) sent as `Authorization`.
    BearerToken(String),
    /// Headers already signed by an external signer.
    SignedHeaders(BTreeMap<String, String>),
}

/// Source of auth material.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Current material, without blocking.
    fn current(&self) -> Result<AuthMaterial, AuthError>;

    /// Fetch fresh material.
    async fn fetch(&self) -> Result<AuthMaterial, AuthError>;
}

/// Caller-supplied material that can be replaced at runtime.
pub struct StaticCredentials {
    material: RwLock<AuthMaterial>,
}

impl StaticCredentials {
    /// Create a provider holding `material`.
    pub fn new(material: AuthMaterial) -> Self {
        Self {
            material: RwLock::new(material),
        }
    }

    /// Replace the held material. Takes effect on the next handshake or subscribe.
    pub fn update(&self, material: AuthMaterial) {
        *self.material.write() = material;
        debug!("Static credentials updated");
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    fn current(&self) -> Result<AuthMaterial, AuthError> {
        Ok(self.material.read().clone())
    }

    async fn fetch(&self) -> Result<AuthMaterial, AuthError> {
        self.current()
    }
}

/// Material with an expiration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringMaterial {
    pub material: AuthMaterial,
    pub expiration: DateTime<Utc>,
}

impl ExpiringMaterial {
    /// Whether the material is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration > now
    }
}

/// Narrow session capability: the most recent fetch result and a way to refresh it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Result of the most recent fetch.
    fn last_result(&self) -> Result<ExpiringMaterial, AuthError>;

    /// Fetch a new session.
    async fn refresh(&self) -> Result<ExpiringMaterial, AuthError>;
}

/// Adapter deriving credential availability from a [`SessionSource`].
pub struct SessionCredentials<S> {
    source: S,
}

impl<S: SessionSource> SessionCredentials<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn check(result: Result<ExpiringMaterial, AuthError>) -> Result<AuthMaterial, AuthError> {
        let session = result?;
        if session.is_valid_at(Utc::now()) {
            Ok(session.material)
        } else {
            Err(AuthError::SessionExpired(format!(
                "credentials expired at {}",
                session.expiration
            )))
        }
    }
}

#[async_trait]
impl<S: SessionSource> CredentialsProvider for SessionCredentials<S> {
    fn current(&self) -> Result<AuthMaterial, AuthError> {
        Self::check(self.source.last_result())
    }

    async fn fetch(&self) -> Result<AuthMaterial, AuthError> {
        Self::check(self.source.refresh().await)
    }
}
