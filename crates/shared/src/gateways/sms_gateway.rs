//! `SmsGateway`: SMS transport is out of scope (spec §1), abstracted the
//! same way as `CalendarGateway`/`LlmGateway`.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub type SmsGatewayFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SmsGatewayError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum SmsGatewayError {
    #[error("sms provider request failed: {0}")]
    ProviderFailure(String),
}

pub trait SmsGateway: Send + Sync {
    fn send_message<'a>(&'a self, phone: &'a str, body: &'a str) -> SmsGatewayFuture<'a>;
}
