//! In-process stand-ins for the vendor chat and voice SDKs so the console
//! can be driven end to end without vendor credentials. Sent messages echo
//! back after a short delay, followed by a canned agent reply with typing
//! signals around it.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use comms_integration::{
    CallEvent, CallHandle, ChatClient, ChatMessage, ConversationEvent, ConversationHandle,
    ConversationParams, VoiceDevice,
};
use shared::domain::{ConversationSid, Identity};
use tokio::sync::broadcast;
use uuid::Uuid;

const AGENT_IDENTITY: &str = "system_assistant";
const AGENT_REPLY: &str = "Thanks for reaching out. A banker will be with you shortly.";

pub struct LoopbackChat {
    local_identity: Identity,
}

impl LoopbackChat {
    pub fn new(local_identity: Identity) -> Arc<Self> {
        Arc::new(Self { local_identity })
    }

    fn conversation(&self, sid: ConversationSid) -> Arc<dyn ConversationHandle> {
        let (events, _) = broadcast::channel(256);
        Arc::new(LoopbackConversation {
            sid,
            local_identity: self.local_identity.clone(),
            events,
        })
    }
}

#[async_trait]
impl ChatClient for LoopbackChat {
    async fn update_token(&self, _token: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_conversation(
        &self,
        sid: &ConversationSid,
    ) -> anyhow::Result<Arc<dyn ConversationHandle>> {
        Ok(self.conversation(sid.clone()))
    }

    async fn create_conversation(
        &self,
        _params: ConversationParams,
    ) -> anyhow::Result<Arc<dyn ConversationHandle>> {
        let sid = ConversationSid(format!("CH{}", Uuid::new_v4().simple()));
        Ok(self.conversation(sid))
    }
}

struct LoopbackConversation {
    sid: ConversationSid,
    local_identity: Identity,
    events: broadcast::Sender<ConversationEvent>,
}

#[async_trait]
impl ConversationHandle for LoopbackConversation {
    fn sid(&self) -> ConversationSid {
        self.sid.clone()
    }

    async fn join(&self, _identity: &Identity) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_message(&self, body: &str) -> anyhow::Result<()> {
        let events = self.events.clone();
        let author = self.local_identity.clone();
        let body = body.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = events.send(ConversationEvent::MessageAdded(ChatMessage {
                author,
                body,
            }));
            let _ = events.send(ConversationEvent::TypingStarted {
                participant: Identity::from(AGENT_IDENTITY),
            });
            tokio::time::sleep(Duration::from_millis(900)).await;
            let _ = events.send(ConversationEvent::TypingEnded {
                participant: Identity::from(AGENT_IDENTITY),
            });
            let _ = events.send(ConversationEvent::MessageAdded(ChatMessage {
                author: Identity::from(AGENT_IDENTITY),
                body: AGENT_REPLY.to_string(),
            }));
        });
        Ok(())
    }

    async fn fetch_messages(&self) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(Vec::new())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }
}

pub struct LoopbackVoice;

impl LoopbackVoice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl VoiceDevice for LoopbackVoice {
    async fn update_token(&self, _token: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn connect(&self) -> anyhow::Result<Arc<dyn CallHandle>> {
        let (events, _) = broadcast::channel(16);
        let call = Arc::new(LoopbackCall {
            events: events.clone(),
        });
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = events.send(CallEvent::Accepted);
        });
        Ok(call)
    }
}

struct LoopbackCall {
    events: broadcast::Sender<CallEvent>,
}

#[async_trait]
impl CallHandle for LoopbackCall {
    async fn disconnect(&self) -> anyhow::Result<()> {
        let _ = self.events.send(CallEvent::Disconnected);
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }
}
