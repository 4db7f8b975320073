use std::sync::Arc;

use reqwest::{Client, StatusCode};
use shared::{
    domain::OtpChannel,
    error::{ApiError, ErrorCode},
    protocol::{
        OtpSendRequest, OtpSendResponse, OtpVerifyRequest, OtpVerifyResponse, RegistrationRequest,
        RegistrationResponse,
    },
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{config::SessionConfig, keys, KeyValueStore};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verification request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no account found for this email")]
    UserNotFound,
    #[error("verification service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("verification service returned a malformed response")]
    MalformedResponse,
}

impl VerifyError {
    /// Shape a failure for the login/registration screens, which branch on
    /// the code: NotFound redirects to registration, everything else is a
    /// blocking alert with the server's message.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            VerifyError::Transport(err) => ApiError::new(ErrorCode::Internal, err.to_string()),
            VerifyError::UserNotFound => {
                ApiError::new(ErrorCode::NotFound, "User not found. Redirect to register.")
            }
            VerifyError::Rejected { status, message } => {
                let code = match status {
                    400 => ErrorCode::MissingParameter,
                    401 => ErrorCode::InvalidCode,
                    _ => ErrorCode::Internal,
                };
                ApiError::new(code, message.clone())
            }
            VerifyError::MalformedResponse => {
                ApiError::new(ErrorCode::Internal, self.to_string())
            }
        }
    }
}

/// Pass-through client for the OTP and registration functions. The actual
/// code delivery and checking happen on the vendor side.
pub struct VerifyClient {
    http: Client,
    otp_send_url: String,
    otp_verify_url: String,
    registration_url: String,
    store: Arc<dyn KeyValueStore>,
}

impl VerifyClient {
    pub fn new(http: Client, config: &SessionConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            http,
            otp_send_url: config.otp_send_url.clone(),
            otp_verify_url: config.otp_verify_url.clone(),
            registration_url: config.registration_url.clone(),
            store,
        }
    }

    /// Request an OTP for `email`. Without a requested channel the service
    /// picks its default delivery; with one, that channel is remembered so
    /// verification checks against the channel the code actually used.
    pub async fn send_otp(
        &self,
        email: &str,
        requested_channel: Option<OtpChannel>,
    ) -> Result<OtpSendResponse, VerifyError> {
        let response = self
            .http
            .post(&self.otp_send_url)
            .json(&OtpSendRequest {
                email: email.to_string(),
                requested_channel,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(VerifyError::UserNotFound);
        }
        if !status.is_success() {
            let message = response
                .json::<OtpSendResponse>()
                .await
                .map(|body| body.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(VerifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: OtpSendResponse = response
            .json()
            .await
            .map_err(|_| VerifyError::MalformedResponse)?;

        if let Some(channel) = requested_channel {
            if let Err(err) = self.store.put(keys::OTP_CHANNEL, channel.as_str()).await {
                warn!("failed to remember OTP channel: {err}");
            }
        }

        info!(email, "one-time password requested");
        Ok(body)
    }

    /// Check a code. `Ok(false)` means the service saw the request but the
    /// code was wrong; a successful check persists the login email.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<bool, VerifyError> {
        let channel = self.stored_channel().await;
        let response = self
            .http
            .post(&self.otp_verify_url)
            .json(&OtpVerifyRequest {
                email: email.to_string(),
                otp: otp.to_string(),
                channel,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            info!(email, "one-time password rejected");
            return Ok(false);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(VerifyError::UserNotFound);
        }
        if !status.is_success() {
            let message = response
                .json::<OtpVerifyResponse>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.to_string());
            return Err(VerifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: OtpVerifyResponse = response
            .json()
            .await
            .map_err(|_| VerifyError::MalformedResponse)?;
        if !body.success {
            return Ok(false);
        }

        if let Err(err) = self.store.put(keys::USER_EMAIL, email).await {
            warn!("failed to persist login email: {err}");
        }
        info!(email, "login verified");
        Ok(true)
    }

    pub async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, VerifyError> {
        let response = self
            .http
            .post(&self.registration_url)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<RegistrationResponse>()
                .await
                .map(|body| body.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(VerifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|_| VerifyError::MalformedResponse)
    }

    async fn stored_channel(&self) -> OtpChannel {
        match self.store.get(keys::OTP_CHANNEL).await {
            Ok(Some(value)) => OtpChannel::parse(&value).unwrap_or(OtpChannel::Whatsapp),
            _ => OtpChannel::Whatsapp,
        }
    }
}
