use std::sync::Arc;

use chrono::Utc;
use comms_integration::{ChatClient, ConversationHandle, ConversationParams};
use shared::domain::{ConversationSid, Identity};
use thiserror::Error;
use tracing::info;

use crate::{keys, KeyValueStore};

const CONVERSATION_FRIENDLY_NAME: &str = "Teller Support Chat";

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("failed to reconnect to conversation {sid}: {source}")]
    Rehydrate {
        sid: ConversationSid,
        source: anyhow::Error,
    },
    #[error("failed to create conversation: {0}")]
    Create(anyhow::Error),
    #[error("failed to join conversation {sid}: {source}")]
    Join {
        sid: ConversationSid,
        source: anyhow::Error,
    },
    #[error("state store failure: {0}")]
    Store(anyhow::Error),
}

/// Resolves the one durable conversation this client talks in: reconnect by
/// persisted id when possible, otherwise create and persist before joining.
pub struct ConversationManager {
    chat: Arc<dyn ChatClient>,
    store: Arc<dyn KeyValueStore>,
}

impl ConversationManager {
    pub fn new(chat: Arc<dyn ChatClient>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { chat, store }
    }

    pub async fn resolve_conversation(
        &self,
        identity: &Identity,
    ) -> Result<Arc<dyn ConversationHandle>, ConversationError> {
        let persisted = self
            .store
            .get(keys::ACTIVE_CONVERSATION_SID)
            .await
            .map_err(ConversationError::Store)?;

        let conversation = match persisted {
            Some(sid) if !sid.is_empty() => {
                let sid = ConversationSid(sid);
                info!(%sid, "reconnecting to existing conversation");
                self.chat
                    .get_conversation(&sid)
                    .await
                    .map_err(|source| ConversationError::Rehydrate { sid, source })?
            }
            _ => {
                info!("no stored conversation; creating a new one");
                let params = ConversationParams {
                    friendly_name: CONVERSATION_FRIENDLY_NAME.to_string(),
                    unique_name: format!("{identity}-teller-chat-{}", Utc::now().timestamp()),
                };
                let conversation = self
                    .chat
                    .create_conversation(params)
                    .await
                    .map_err(ConversationError::Create)?;
                // persist before joining so a reload rehydrates instead of
                // creating a duplicate
                self.store
                    .put(keys::ACTIVE_CONVERSATION_SID, conversation.sid().as_str())
                    .await
                    .map_err(ConversationError::Store)?;
                info!(sid = %conversation.sid(), "conversation created and persisted");
                conversation
            }
        };

        if let Err(source) = conversation.join(identity).await {
            if is_already_joined_error(&source) {
                info!(sid = %conversation.sid(), "identity already joined to conversation");
            } else {
                return Err(ConversationError::Join {
                    sid: conversation.sid(),
                    source,
                });
            }
        }

        Ok(conversation)
    }
}

fn is_already_joined_error(err: &anyhow::Error) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("already a participant")
        || message.contains("already joined")
        || message.contains("participant exists")
}
