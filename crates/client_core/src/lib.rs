use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use comms_integration::{ChatClient, ConversationHandle, ConversationParams, VoiceDevice};
use shared::domain::{ConversationSid, CorrelationId};
use tokio::sync::Mutex;

pub mod call;
pub mod config;
pub mod conversation;
pub mod identity;
pub mod reconcile;
pub mod session;
pub mod token;
pub mod verify;

pub use call::CallController;
pub use config::SessionConfig;
pub use conversation::{ConversationError, ConversationManager};
pub use identity::IdentityStore;
pub use reconcile::{MessageLayer, MessageView};
pub use session::Session;
pub use token::{Credential, TokenError, TokenService};
pub use verify::{VerifyClient, VerifyError};

/// Persisted key-value slots this client uses.
pub mod keys {
    pub const CLIENT_IDENTITY: &str = "client_identity";
    pub const ACTIVE_CONVERSATION_SID: &str = "active_conversation_sid";
    pub const USER_EMAIL: &str = "user_email";
    pub const OTP_CHANNEL: &str = "otp_channel";
}

/// Seam over local key-value persistence. The durable implementation wraps
/// the SQLite store; the in-memory one backs session-scoped state and tests.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub struct DurableKeyValueStore {
    storage: storage::Storage,
}

impl DurableKeyValueStore {
    pub fn new(storage: storage::Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl KeyValueStore for DurableKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.storage.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.storage.delete(key).await
    }
}

/// Session-scoped storage that dies with the process.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

pub struct MissingChatClient;

#[async_trait]
impl ChatClient for MissingChatClient {
    async fn update_token(&self, _token: &str) -> Result<()> {
        Err(anyhow!("chat capability is unavailable"))
    }

    async fn get_conversation(
        &self,
        sid: &ConversationSid,
    ) -> Result<Arc<dyn ConversationHandle>> {
        Err(anyhow!("chat capability is unavailable for conversation {sid}"))
    }

    async fn create_conversation(
        &self,
        _params: ConversationParams,
    ) -> Result<Arc<dyn ConversationHandle>> {
        Err(anyhow!("chat capability is unavailable"))
    }
}

pub struct MissingVoiceDevice;

#[async_trait]
impl VoiceDevice for MissingVoiceDevice {
    async fn update_token(&self, _token: &str) -> Result<()> {
        Err(anyhow!("voice capability is unavailable"))
    }

    async fn connect(&self) -> Result<Arc<dyn comms_integration::CallHandle>> {
        Err(anyhow!("voice capability is unavailable"))
    }
}

/// Events the session fans out to whatever front end is attached.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    CredentialRefreshed,
    ConversationResolved(ConversationSid),
    MessageAppended(MessageView),
    MessageConfirmed(CorrelationId),
    SystemMessagesRemoved { text: String },
    CallStateChanged { active: bool },
    Error(String),
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod reconcile_tests;

#[cfg(test)]
#[path = "tests/call_tests.rs"]
mod call_tests;
