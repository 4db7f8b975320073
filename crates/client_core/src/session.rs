use std::sync::Arc;

use anyhow::{Context, Result};
use comms_integration::{ChatClient, VoiceDevice};
use reqwest::Client;
use shared::domain::CorrelationId;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    call::CallController,
    config::SessionConfig,
    conversation::ConversationManager,
    identity::IdentityStore,
    reconcile::{MessageLayer, MessageView},
    token::{self, RenewalTargets, SharedCredential, TokenService},
    KeyValueStore, MemoryKeyValueStore, SessionEvent,
};

const PROFILE_CACHE_KEY: &str = "cached_profile";

#[derive(Default)]
struct SessionTasks {
    event_pump: Option<JoinHandle<()>>,
    renewal: Option<JoinHandle<()>>,
}

/// Explicit session context owning every component for the lifetime of a
/// login: created at bootstrap, torn down at logout. Replaces the pile of
/// page-global singletons the flow grew out of.
pub struct Session {
    config: SessionConfig,
    identities: Arc<IdentityStore>,
    tokens: Arc<TokenService>,
    chat: Arc<dyn ChatClient>,
    voice: Option<Arc<dyn VoiceDevice>>,
    conversations: ConversationManager,
    calls: Arc<CallController>,
    credential: Mutex<Option<SharedCredential>>,
    messages: Mutex<Option<Arc<MessageLayer>>>,
    profile_cache: MemoryKeyValueStore,
    tasks: Mutex<SessionTasks>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn KeyValueStore>,
        chat: Arc<dyn ChatClient>,
        voice: Option<Arc<dyn VoiceDevice>>,
    ) -> Result<Arc<Self>> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .context("failed to build http client")?;

        let identities = Arc::new(IdentityStore::new(Arc::clone(&store)));
        let tokens = Arc::new(TokenService::new(
            http,
            config.token_url.clone(),
            Arc::clone(&identities),
            config.token_ttl(),
        ));
        let conversations = ConversationManager::new(Arc::clone(&chat), store);
        let (events, _) = broadcast::channel(256);
        let calls = CallController::new(voice.clone(), events.clone());

        Ok(Arc::new(Self {
            config,
            identities,
            tokens,
            chat,
            voice,
            conversations,
            calls,
            credential: Mutex::new(None),
            messages: Mutex::new(None),
            profile_cache: MemoryKeyValueStore::new(),
            tasks: Mutex::new(SessionTasks::default()),
            events,
        }))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn identity_store(&self) -> &Arc<IdentityStore> {
        &self.identities
    }

    /// Bring the session up: identity, credential, capability token
    /// hand-off, conversation resolution, history replay, then the
    /// background event pump and renewal loop. A token failure aborts here;
    /// the caller's UI stays up with chat unavailable.
    pub async fn bootstrap(self: &Arc<Self>) -> Result<()> {
        let identity = self.identities.get_identity().await?;
        info!(%identity, "starting session bootstrap");

        let credential = self
            .tokens
            .fetch_credential(&identity)
            .await
            .context("failed to obtain an access token")?;
        // the issuer may have corrected our identity
        let identity = credential.identity.clone();

        self.chat
            .update_token(&credential.token)
            .await
            .context("chat client rejected the access token")?;
        if let Some(voice) = &self.voice {
            if let Err(err) = voice.update_token(&credential.token).await {
                warn!("voice device rejected the access token: {err}");
            }
        }

        let shared: SharedCredential = Arc::new(Mutex::new(credential));
        *self.credential.lock().await = Some(Arc::clone(&shared));

        let conversation = self.conversations.resolve_conversation(&identity).await?;
        let _ = self
            .events
            .send(SessionEvent::ConversationResolved(conversation.sid()));

        let layer = Arc::new(MessageLayer::new(
            Arc::clone(&conversation),
            identity,
            self.events.clone(),
        ));
        if let Err(err) = layer.load_history().await {
            warn!("failed to replay conversation history: {err}");
        }
        *self.messages.lock().await = Some(Arc::clone(&layer));

        let event_pump = {
            let mut inbound = conversation.subscribe_events();
            let layer = Arc::clone(&layer);
            tokio::spawn(async move {
                while let Ok(event) = inbound.recv().await {
                    layer.on_remote_event(event).await;
                }
            })
        };

        let renewal = token::spawn_renewal_loop(
            Arc::clone(&self.tokens),
            shared,
            RenewalTargets {
                chat: Arc::clone(&self.chat),
                voice: self.voice.clone(),
            },
            self.config.renewal_check_interval(),
            self.config.renewal_lead(),
            self.events.clone(),
        );

        let mut tasks = self.tasks.lock().await;
        tasks.event_pump = Some(event_pump);
        tasks.renewal = Some(renewal);
        info!("session bootstrap complete");
        Ok(())
    }

    /// Optimistic send through the reconciliation layer. A no-op when the
    /// conversation is not resolved yet.
    pub async fn send_message(&self, text: &str) -> Result<Option<CorrelationId>> {
        let layer = self.messages.lock().await.clone();
        let Some(layer) = layer else {
            warn!("conversation not ready; dropping outgoing message");
            return Ok(None);
        };
        layer.send_local(text).await
    }

    pub async fn transcript(&self) -> Vec<MessageView> {
        match self.messages.lock().await.clone() {
            Some(layer) => layer.snapshot().await,
            None => Vec::new(),
        }
    }

    pub async fn toggle_call(&self) -> Result<()> {
        self.calls.toggle().await
    }

    pub async fn call_active(&self) -> bool {
        self.calls.is_active().await
    }

    pub async fn cache_profile(&self, profile_json: &str) {
        let _ = self.profile_cache.put(PROFILE_CACHE_KEY, profile_json).await;
    }

    pub async fn cached_profile(&self) -> Option<String> {
        self.profile_cache.get(PROFILE_CACHE_KEY).await.ok().flatten()
    }

    /// Stop background work and drop live handles. Safe to call twice.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.event_pump.take() {
            task.abort();
        }
        if let Some(task) = tasks.renewal.take() {
            task.abort();
        }
        drop(tasks);

        self.calls.shutdown().await;
        *self.messages.lock().await = None;
        *self.credential.lock().await = None;
        info!("session shut down");
    }

    /// Shutdown plus identity reset and profile-cache clear.
    pub async fn logout(&self) -> Result<()> {
        self.shutdown().await;
        self.identities.reset().await?;
        self.profile_cache.clear().await;
        Ok(())
    }
}
