//! Application configuration.

use crate::error::{AppError, AppResult};
use rtsub_core::AuthMaterial;
use rtsub_ws::{ClientConfig, SubscriptionRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How the client authorizes against the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    BearerToken,
}

/// Credentials configuration.
///
/// The secret is read from `value` if present, otherwise from the environment
/// variable named by `value_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default = "default_value_env")]
    pub value_env: String,
}

fn default_value_env() -> String {
    "RTSUB_AUTH".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            value: None,
            value_env: default_value_env(),
        }
    }
}

impl AuthConfig {
    /// Resolve the configured secret into auth material.
    pub fn material(&self) -> AppResult<AuthMaterial> {
        let value = match &self.value {
            Some(value) => value.clone(),
            None => std::env::var(&self.value_env).map_err(|_| {
                AppError::Config(format!(
                    "No credentials: set auth.value or the {} environment variable",
                    self.value_env
                ))
            })?,
        };

        if value.trim().is_empty() {
            return Err(AppError::Config("Credential value is empty".to_string()));
        }

        Ok(match self.mode {
            AuthMode::ApiKey => AuthMaterial::ApiKey(value),
            AuthMode::BearerToken => AuthMaterial::BearerToken(value),
        })
    }
}

/// One subscription to open at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Label used in the output lines.
    pub name: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

impl SubscriptionConfig {
    pub fn request(&self) -> SubscriptionRequest {
        let request = SubscriptionRequest::new(self.query.clone());
        match &self.variables {
            Some(variables) => request.with_variables(variables.clone()),
            None => request,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub client: ClientConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl AppConfig {
    /// Configuration for `endpoint` with default client settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: ClientConfig::new(endpoint),
            auth: AuthConfig::default(),
            subscriptions: Vec::new(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::parse(&content)
    }

    /// Parse TOML configuration.
    pub fn parse(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(
        &mut self,
        endpoint: Option<String>,
        queries: Vec<String>,
        auth_value: Option<String>,
    ) {
        if let Some(endpoint) = endpoint {
            self.client.endpoint = endpoint;
        }
        if let Some(value) = auth_value {
            self.auth.value = Some(value);
        }
        for (index, query) in queries.into_iter().enumerate() {
            self.subscriptions.push(SubscriptionConfig {
                name: format!("cli-{}", index + 1),
                query,
                variables: None,
            });
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> AppResult<()> {
        if self.client.endpoint.trim().is_empty() {
            return Err(AppError::Config("client.endpoint is required".to_string()));
        }
        self.client.validate()?;

        if self.subscriptions.is_empty() {
            return Err(AppError::Config(
                "At least one subscription is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for subscription in &self.subscriptions {
            if !names.insert(subscription.name.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate subscription name: {}",
                    subscription.name
                )));
            }
        }
        Ok(())
    }
}
