use std::sync::Arc;

use anyhow::Result;
use comms_integration::{ConversationEvent, ConversationHandle};
use shared::domain::{CorrelationId, Identity, MessageDirection, MessageStatus};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};

use crate::SessionEvent;

pub const TYPING_CAPTION: &str = "Agent is typing...";

/// One rendered transcript entry. Outgoing views start in `Sending` and are
/// flipped to `Sent` either by the send completion (matched by correlation
/// id) or by the server echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub correlation: CorrelationId,
    pub text: String,
    pub direction: MessageDirection,
    pub status: MessageStatus,
}

/// Optimistic transcript over a resolved conversation: local sends render
/// immediately, the authoritative event stream reconciles them.
pub struct MessageLayer {
    conversation: Arc<dyn ConversationHandle>,
    identity: Identity,
    transcript: Mutex<Vec<MessageView>>,
    events: broadcast::Sender<SessionEvent>,
}

impl MessageLayer {
    pub fn new(
        conversation: Arc<dyn ConversationHandle>,
        identity: Identity,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            conversation,
            identity,
            transcript: Mutex::new(Vec::new()),
            events,
        }
    }

    pub async fn snapshot(&self) -> Vec<MessageView> {
        self.transcript.lock().await.clone()
    }

    /// Replays prior history once, after conversation resolution. Historical
    /// messages render as already sent; direction falls out of the author.
    pub async fn load_history(&self) -> Result<()> {
        let messages = self.conversation.fetch_messages().await?;
        let mut transcript = self.transcript.lock().await;
        for message in messages {
            let direction = if message.author == self.identity {
                MessageDirection::Outgoing
            } else {
                MessageDirection::Incoming
            };
            let view = MessageView {
                correlation: CorrelationId::generate(),
                text: message.body,
                direction,
                status: MessageStatus::Sent,
            };
            let _ = self.events.send(SessionEvent::MessageAppended(view.clone()));
            transcript.push(view);
        }
        Ok(())
    }

    /// Optimistic send. Whitespace-only input produces no view and no
    /// network call. A send failure is logged and the view stays pending;
    /// the echo still reconciles it if delivery eventually happened.
    pub async fn send_local(&self, text: &str) -> Result<Option<CorrelationId>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let view = MessageView {
            correlation: CorrelationId::generate(),
            text: text.to_string(),
            direction: MessageDirection::Outgoing,
            status: MessageStatus::Sending,
        };
        let correlation = view.correlation;
        self.transcript.lock().await.push(view.clone());
        let _ = self.events.send(SessionEvent::MessageAppended(view));

        match self.conversation.send_message(text).await {
            Ok(()) => {
                self.mark_sent(correlation).await;
            }
            Err(err) => {
                error!("failed to send message: {err}");
            }
        }
        Ok(Some(correlation))
    }

    pub async fn on_remote_event(&self, event: ConversationEvent) {
        match event {
            ConversationEvent::MessageAdded(message) => {
                if message.author == self.identity {
                    self.reconcile_own_echo(&message.body).await;
                } else {
                    info!(author = %message.author, "incoming message");
                    let view = MessageView {
                        correlation: CorrelationId::generate(),
                        text: message.body,
                        direction: MessageDirection::Incoming,
                        status: MessageStatus::Sent,
                    };
                    self.transcript.lock().await.push(view.clone());
                    let _ = self.events.send(SessionEvent::MessageAppended(view));
                }
            }
            ConversationEvent::TypingStarted { participant } => {
                if is_agent_participant(&participant) {
                    let view = MessageView {
                        correlation: CorrelationId::generate(),
                        text: TYPING_CAPTION.to_string(),
                        direction: MessageDirection::System,
                        status: MessageStatus::Sent,
                    };
                    self.transcript.lock().await.push(view.clone());
                    let _ = self.events.send(SessionEvent::MessageAppended(view));
                }
            }
            ConversationEvent::TypingEnded { participant } => {
                if is_agent_participant(&participant) {
                    self.remove_system_views(TYPING_CAPTION).await;
                }
            }
        }
    }

    /// Flip the exact view the caller created. False when it was already
    /// confirmed (the echo won the race).
    async fn mark_sent(&self, correlation: CorrelationId) -> bool {
        let confirmed = {
            let mut transcript = self.transcript.lock().await;
            match transcript
                .iter_mut()
                .find(|view| view.correlation == correlation)
            {
                Some(view) if view.status == MessageStatus::Sending => {
                    view.status = MessageStatus::Sent;
                    true
                }
                _ => false,
            }
        };
        if confirmed {
            let _ = self.events.send(SessionEvent::MessageConfirmed(correlation));
        }
        confirmed
    }

    /// An echo confirms the oldest still-pending outgoing view with the
    /// same text. With nothing pending it is a duplicate of a view the
    /// direct send path already confirmed, and is dropped.
    async fn reconcile_own_echo(&self, body: &str) {
        let correlation = {
            let mut transcript = self.transcript.lock().await;
            transcript
                .iter_mut()
                .find(|view| {
                    view.direction == MessageDirection::Outgoing
                        && view.status == MessageStatus::Sending
                        && view.text == body
                })
                .map(|view| {
                    view.status = MessageStatus::Sent;
                    view.correlation
                })
        };
        if let Some(correlation) = correlation {
            let _ = self.events.send(SessionEvent::MessageConfirmed(correlation));
        }
    }

    async fn remove_system_views(&self, text: &str) {
        let removed = {
            let mut transcript = self.transcript.lock().await;
            let before = transcript.len();
            transcript.retain(|view| {
                !(view.direction == MessageDirection::System && view.text == text)
            });
            before != transcript.len()
        };
        if removed {
            let _ = self.events.send(SessionEvent::SystemMessagesRemoved {
                text: text.to_string(),
            });
        }
    }
}

fn is_agent_participant(identity: &Identity) -> bool {
    identity.as_str().contains("system") || identity.as_str().contains("assistant")
}
