use std::{collections::HashMap, fs, time::Duration};

use anyhow::{Context, Result};
use url::Url;

/// Client-side settings: vendor endpoint URLs plus the token-lifecycle
/// timing knobs. Defaults match the hosted demo deployment; a local
/// `teller.toml` and environment variables override them.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub token_url: String,
    pub otp_send_url: String,
    pub otp_verify_url: String,
    pub registration_url: String,
    pub database_url: String,
    pub token_ttl_seconds: u64,
    pub renewal_check_seconds: u64,
    pub renewal_lead_seconds: u64,
    pub http_timeout_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_url: "https://teller-demo.example.com/issue-access-token".into(),
            otp_send_url: "https://teller-demo.example.com/send-one-time-password".into(),
            otp_verify_url: "https://teller-demo.example.com/verify-one-time-password".into(),
            registration_url: "https://teller-demo.example.com/register-customer".into(),
            database_url: "sqlite://./data/teller.db".into(),
            token_ttl_seconds: 3600,
            renewal_check_seconds: 3300,
            renewal_lead_seconds: 30,
            http_timeout_seconds: 30,
        }
    }
}

impl SessionConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }

    pub fn renewal_check_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_check_seconds)
    }

    pub fn renewal_lead(&self) -> Duration {
        Duration::from_secs(self.renewal_lead_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("token_url", &self.token_url),
            ("otp_send_url", &self.otp_send_url),
            ("otp_verify_url", &self.otp_verify_url),
            ("registration_url", &self.registration_url),
        ] {
            Url::parse(value).with_context(|| format!("invalid {name}: '{value}'"))?;
        }
        Ok(())
    }
}

pub fn load_config() -> SessionConfig {
    let mut config = SessionConfig::default();

    if let Ok(raw) = fs::read_to_string("teller.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("token_url") {
                config.token_url = v.clone();
            }
            if let Some(v) = file_cfg.get("otp_send_url") {
                config.otp_send_url = v.clone();
            }
            if let Some(v) = file_cfg.get("otp_verify_url") {
                config.otp_verify_url = v.clone();
            }
            if let Some(v) = file_cfg.get("registration_url") {
                config.registration_url = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url") {
                config.database_url = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("TELLER_TOKEN_URL") {
        config.token_url = v;
    }
    if let Ok(v) = std::env::var("TELLER_OTP_SEND_URL") {
        config.otp_send_url = v;
    }
    if let Ok(v) = std::env::var("TELLER_OTP_VERIFY_URL") {
        config.otp_verify_url = v;
    }
    if let Ok(v) = std::env::var("TELLER_REGISTER_URL") {
        config.registration_url = v;
    }
    if let Ok(v) = std::env::var("TELLER_DATABASE_URL") {
        config.database_url = v;
    }
    if let Ok(v) = std::env::var("TELLER_TOKEN_TTL_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            config.token_ttl_seconds = parsed;
        }
    }
    if let Ok(v) = std::env::var("TELLER_RENEWAL_CHECK_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            config.renewal_check_seconds = parsed;
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings_match_the_hosted_deployment() {
        let config = SessionConfig::default();
        assert_eq!(config.token_ttl(), Duration::from_secs(3600));
        assert_eq!(config.renewal_check_interval(), Duration::from_secs(3300));
        assert_eq!(config.renewal_lead(), Duration::from_secs(30));
    }

    #[test]
    fn default_endpoints_are_well_formed() {
        SessionConfig::default().validate().expect("valid defaults");
    }

    #[test]
    fn validate_rejects_a_garbage_endpoint() {
        let config = SessionConfig {
            token_url: "not a url".into(),
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
