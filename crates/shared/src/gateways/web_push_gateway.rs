//! Concrete `PushGateway` over the Web Push protocol's transport envelope.
//! Spec §1 puts push transport out of bounds; this adapter carries a single
//! pre-provisioned bearer token rather than a VAPID keypair/JWT signer, and
//! sends the notification payload as plaintext JSON rather than implementing
//! RFC 8291 payload encryption — both are wire-protocol details the spec
//! doesn't ask this crate to own.

use std::time::Duration;

use serde_json::json;

use super::push_gateway::{PushGateway, PushGatewayError, PushGatewayFuture};
use crate::config::ConfigError;
use crate::config_env::{parse_u64_env, require_env};
use crate::domain::push::PushSubscription;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_TTL_SECONDS: &str = "86400";

#[derive(Debug, Clone)]
pub struct WebPushGatewayConfig {
    pub bearer_token: String,
    pub timeout_ms: u64,
}

impl WebPushGatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bearer_token: require_env("WEB_PUSH_BEARER_TOKEN")?,
            timeout_ms: parse_u64_env("WEB_PUSH_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
        })
    }
}

#[derive(Clone)]
pub struct WebPushGateway {
    client: reqwest::Client,
    config: WebPushGatewayConfig,
}

impl WebPushGateway {
    pub fn new(config: WebPushGatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

impl PushGateway for WebPushGateway {
    fn send_push<'a>(
        &'a self,
        subscription: &'a PushSubscription,
        payload: &'a str,
    ) -> PushGatewayFuture<'a> {
        Box::pin(async move {
            let body = json!({
                "p256dh": subscription.p256dh,
                "auth": subscription.auth,
                "message": payload,
            });

            let response = self
                .client
                .post(&subscription.endpoint)
                .bearer_auth(&self.config.bearer_token)
                .header("TTL", DEFAULT_TTL_SECONDS)
                .json(&body)
                .send()
                .await
                .map_err(|err| PushGatewayError::ProviderFailure(err.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            if status.as_u16() == 404 || status.as_u16() == 410 {
                return Err(PushGatewayError::SubscriptionGone);
            }

            Err(PushGatewayError::ProviderFailure(format!(
                "web push endpoint responded with HTTP {}",
                status.as_u16()
            )))
        })
    }
}
