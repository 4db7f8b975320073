use serde::{Deserialize, Serialize};

use crate::domain::{Identity, OtpChannel};

/// Request body for the vendor token-issuance function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub identity: Identity,
}

/// Success body from the token-issuance function. The returned identity is
/// authoritative and may differ from the requested one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub identity: Identity,
}

/// Error body the token-issuance function returns on 4xx/5xx.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSendRequest {
    pub email: String,
    #[serde(
        rename = "requestedChannel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_channel: Option<OtpChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSendResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub otp: String,
    pub channel: OtpChannel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub event: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub success: bool,
    pub message: String,
}
