//! Concrete `SmsGateway` over the Twilio Messages API. Spec §1 puts SMS
//! transport out of bounds, so this adapter is deliberately thin: one
//! account, no delivery-status webhooks, no number pooling.

use std::time::Duration;

use reqwest::StatusCode;

use super::sms_gateway::{SmsGateway, SmsGatewayError, SmsGatewayFuture};
use crate::config::ConfigError;
use crate::config_env::{optional_trimmed_env, parse_u64_env, require_env};

const DEFAULT_BASE_URL: &str = "https://api.twilio.com/2010-04-01/Accounts";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct TwilioSmsGatewayConfig {
    pub base_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub timeout_ms: u64,
}

impl TwilioSmsGatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: optional_trimmed_env("TWILIO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            account_sid: require_env("TWILIO_ACCOUNT_SID")?,
            auth_token: require_env("TWILIO_AUTH_TOKEN")?,
            from_number: require_env("TWILIO_FROM_NUMBER")?,
            timeout_ms: parse_u64_env("TWILIO_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
        })
    }
}

#[derive(Clone)]
pub struct TwilioSmsGateway {
    client: reqwest::Client,
    config: TwilioSmsGatewayConfig,
}

impl TwilioSmsGateway {
    pub fn new(config: TwilioSmsGatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

impl SmsGateway for TwilioSmsGateway {
    fn send_message<'a>(&'a self, phone: &'a str, body: &'a str) -> SmsGatewayFuture<'a> {
        Box::pin(async move {
            let url = format!("{}/{}/Messages.json", self.config.base_url, self.config.account_sid);

            let response = self
                .client
                .post(url)
                .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
                .form(&[
                    ("To", phone),
                    ("From", self.config.from_number.as_str()),
                    ("Body", body),
                ])
                .send()
                .await
                .map_err(|err| SmsGatewayError::ProviderFailure(err.to_string()))?;

            if response.status().is_success() {
                return Ok(());
            }

            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            Err(SmsGatewayError::ProviderFailure(format!(
                "twilio responded with HTTP {}: {}",
                status_label(status),
                detail
            )))
        })
    }
}

fn status_label(status: StatusCode) -> String {
    status.as_u16().to_string()
}
