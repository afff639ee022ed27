//! Game-server identity check for plugin routes
//!
//! Each server ID has a shared key. Keys are held as SHA-256 digests and
//! compared without early exit.

use crate::error::ApiError;
use globalbank_ledger::ServerId;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Header carrying the plugin's shared key
pub const SERVER_KEY_HEADER: &str = "x-server-key";

/// Known plugin keys by server
#[derive(Debug, Clone, Default)]
pub struct ServerKeys {
    digests: HashMap<String, [u8; 32]>,
}

impl ServerKeys {
    /// Build from the configured `server id → key` table
    pub fn from_config(keys: &BTreeMap<String, String>) -> Self {
        let digests = keys
            .iter()
            .map(|(server, key)| (server.clone(), digest(key)))
            .collect();
        Self { digests }
    }

    /// Number of registered servers
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Whether no server is registered
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Check `presented` against the key registered for `server_id`
    pub fn verify(&self, server_id: &ServerId, presented: Option<&str>) -> Result<(), ApiError> {
        let presented = presented
            .ok_or_else(|| ApiError::Unauthenticated("missing X-Server-Key header".to_string()))?;

        let expected = self.digests.get(server_id.as_str()).ok_or_else(|| {
            tracing::warn!(server_id = %server_id, "Plugin call from unregistered server");
            ApiError::Unauthenticated("unknown server".to_string())
        })?;

        let actual = digest(presented);
        let diff = expected
            .iter()
            .zip(actual.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));

        if diff != 0 {
            tracing::warn!(server_id = %server_id, "Plugin call with wrong server key");
            return Err(ApiError::Unauthenticated("invalid server key".to_string()));
        }
        Ok(())
    }
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}
