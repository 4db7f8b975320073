use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use comms_integration::{ChatClient, VoiceDevice};
use reqwest::Client;
use shared::{
    domain::Identity,
    protocol::{TokenErrorResponse, TokenRequest, TokenResponse},
};
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, warn};

use crate::{identity::IdentityStore, SessionEvent};

/// Short-lived access credential shared by the chat and voice capabilities.
/// Owned by the renewal loop; capabilities receive the raw token by value
/// through `update_token`.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub identity: Identity,
    pub issued_at: Instant,
    pub ttl: Duration,
}

impl Credential {
    pub fn expires_at(&self) -> Instant {
        self.issued_at + self.ttl
    }

    /// True once the current time is inside the renewal lead window.
    pub fn needs_renewal(&self, now: Instant, lead: Duration) -> bool {
        now > self.expires_at() - lead
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("token response missing a usable token")]
    MalformedResponse,
}

pub struct TokenService {
    http: Client,
    token_url: String,
    identities: Arc<IdentityStore>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(
        http: Client,
        token_url: impl Into<String>,
        identities: Arc<IdentityStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            identities,
            ttl,
        }
    }

    /// Fetch a fresh credential for `identity`. Any transport error,
    /// non-success status, or body without a token comes back as a typed
    /// failure; callers treat it as "no usable token" and keep running.
    pub async fn fetch_credential(&self, identity: &Identity) -> Result<Credential, TokenError> {
        let response = self
            .http
            .post(&self.token_url)
            .json(&TokenRequest {
                identity: identity.clone(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<TokenErrorResponse>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|_| TokenError::MalformedResponse)?;
        if body.token.is_empty() {
            return Err(TokenError::MalformedResponse);
        }

        if body.identity != *identity {
            warn!(
                requested = %identity,
                issued = %body.identity,
                "token issuer returned a different identity; adopting it"
            );
            if let Err(err) = self.identities.adopt(body.identity.clone()).await {
                warn!("failed to persist issuer identity: {err}");
            }
        }

        info!(identity = %body.identity, "access token issued");
        Ok(Credential {
            token: body.token,
            identity: body.identity,
            issued_at: Instant::now(),
            ttl: self.ttl,
        })
    }
}

pub type SharedCredential = Arc<Mutex<Credential>>;

/// Capability objects that must pick up each refreshed token in place.
pub struct RenewalTargets {
    pub chat: Arc<dyn ChatClient>,
    pub voice: Option<Arc<dyn VoiceDevice>>,
}

/// One check-and-maybe-refresh cycle. Returns whether a refresh happened.
/// On failure the previous credential stays in effect; expiry handling is
/// left to the capabilities' own reauthorization signals.
pub async fn maybe_refresh(
    service: &TokenService,
    credential: &SharedCredential,
    targets: &RenewalTargets,
    lead: Duration,
) -> Result<bool, TokenError> {
    let identity = {
        let guard = credential.lock().await;
        if !guard.needs_renewal(Instant::now(), lead) {
            return Ok(false);
        }
        guard.identity.clone()
    };

    info!(identity = %identity, "access token inside renewal window; refreshing");
    let fresh = service.fetch_credential(&identity).await?;

    if let Err(err) = targets.chat.update_token(&fresh.token).await {
        warn!("chat client rejected refreshed token: {err}");
    }
    if let Some(voice) = &targets.voice {
        if let Err(err) = voice.update_token(&fresh.token).await {
            warn!("voice device rejected refreshed token: {err}");
        }
    }

    *credential.lock().await = fresh;
    Ok(true)
}

/// Background renewal timer. Cycles are serialized by the single interval;
/// a check completes (or fails) before the next tick fires.
pub fn spawn_renewal_loop(
    service: Arc<TokenService>,
    credential: SharedCredential,
    targets: RenewalTargets,
    check_interval: Duration,
    lead: Duration,
    events: tokio::sync::broadcast::Sender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(check_interval);
        // the first tick completes immediately; skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match maybe_refresh(&service, &credential, &targets, lead).await {
                Ok(true) => {
                    let _ = events.send(SessionEvent::CredentialRefreshed);
                }
                Ok(false) => {}
                Err(err) => {
                    error!("token refresh failed; keeping current credential: {err}");
                    let _ = events.send(SessionEvent::Error(format!("token refresh failed: {err}")));
                }
            }
        }
    })
}
