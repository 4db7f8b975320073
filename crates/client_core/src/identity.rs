use std::sync::Arc;

use anyhow::Result;
use shared::domain::Identity;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{keys, KeyValueStore};

/// Identities minted by a buggy early build; treat them as absent so
/// affected clients converge on a fresh value.
const STALE_IDENTITY_PREFIX: &str = "user-fzk47";

/// Resolves and persists the stable pseudo-random identity for this client.
/// Repeated calls within a session return the same value until `reset`.
pub struct IdentityStore {
    store: Arc<dyn KeyValueStore>,
    cached: Mutex<Option<Identity>>,
}

impl IdentityStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    pub async fn get_identity(&self) -> Result<Identity> {
        let mut cached = self.cached.lock().await;
        if let Some(identity) = cached.as_ref() {
            return Ok(identity.clone());
        }

        let identity = match self.store.get(keys::CLIENT_IDENTITY).await? {
            Some(value) if !value.is_empty() && !value.starts_with(STALE_IDENTITY_PREFIX) => {
                Identity(value)
            }
            _ => {
                let fresh = generate_identity();
                self.store.put(keys::CLIENT_IDENTITY, fresh.as_str()).await?;
                info!(identity = %fresh, "generated new client identity");
                fresh
            }
        };

        *cached = Some(identity.clone());
        Ok(identity)
    }

    /// The token issuer is authoritative; overwrite whatever we had.
    pub async fn adopt(&self, identity: Identity) -> Result<()> {
        warn!(identity = %identity, "adopting server-issued identity over local value");
        self.store.put(keys::CLIENT_IDENTITY, identity.as_str()).await?;
        *self.cached.lock().await = Some(identity);
        Ok(())
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.delete(keys::CLIENT_IDENTITY).await?;
        *self.cached.lock().await = None;
        Ok(())
    }
}

fn generate_identity() -> Identity {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    Identity(format!("user-{suffix}"))
}
