use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{ConversationSid, Identity};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationParams {
    pub friendly_name: String,
    pub unique_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author: Identity,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    MessageAdded(ChatMessage),
    TypingStarted { participant: Identity },
    TypingEnded { participant: Identity },
}

/// A durable message channel resolved from the vendor chat SDK.
#[async_trait]
pub trait ConversationHandle: Send + Sync {
    fn sid(&self) -> ConversationSid;
    async fn join(&self, identity: &Identity) -> anyhow::Result<()>;
    async fn send_message(&self, body: &str) -> anyhow::Result<()>;
    async fn fetch_messages(&self) -> anyhow::Result<Vec<ChatMessage>>;
    fn subscribe_events(&self) -> broadcast::Receiver<ConversationEvent>;
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn update_token(&self, token: &str) -> anyhow::Result<()>;
    async fn get_conversation(
        &self,
        sid: &ConversationSid,
    ) -> anyhow::Result<Arc<dyn ConversationHandle>>;
    async fn create_conversation(
        &self,
        params: ConversationParams,
    ) -> anyhow::Result<Arc<dyn ConversationHandle>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Accepted,
    Disconnected,
}

/// One in-flight call obtained from the voice device.
#[async_trait]
pub trait CallHandle: Send + Sync {
    async fn disconnect(&self) -> anyhow::Result<()>;
    fn subscribe_events(&self) -> broadcast::Receiver<CallEvent>;
}

#[async_trait]
pub trait VoiceDevice: Send + Sync {
    async fn update_token(&self, token: &str) -> anyhow::Result<()>;
    async fn connect(&self) -> anyhow::Result<Arc<dyn CallHandle>>;
}
