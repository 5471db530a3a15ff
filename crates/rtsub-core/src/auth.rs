//! Authorization payload carried by `connection_init` and `start` frames.

use crate::credentials::AuthMaterial;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON authorization object, e.g. `{"host": "...", "x-api-key": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthPayload(Map<String, Value>);

impl AuthPayload {
    /// Build the payload for `host` from the given material.
    pub fn from_material(host: &str, material: &AuthMaterial) -> Self {
        let mut fields = Map::new();
        fields.insert("host".to_string(), Value::String(host.to_string()));

        match material {
            AuthMaterial::ApiKey(key) => {
                fields.insert("x-api-key".to_string(), Value::String(key.clone()));
            }
            AuthMaterial::BearerToken(token) => {
                fields.insert("Authorization".to_string(), Value::String(token.clone()));
            }
            AuthMaterial::SignedHeaders(headers) => {
                for (name, value) in headers {
                    fields.insert(name.clone(), Value::String(value.clone()));
                }
            }
        }

        Self(fields)
    }

    /// Look up a single field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
