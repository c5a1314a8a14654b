//! `PushGateway`: web-push transport is out of scope (spec §1), abstracted
//! the same way as `CalendarGateway`/`LlmGateway`.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::domain::push::PushSubscription;

pub type PushGatewayFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PushGatewayError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum PushGatewayError {
    #[error("push subscription is no longer valid")]
    SubscriptionGone,
    #[error("push provider request failed: {0}")]
    ProviderFailure(String),
}

pub trait PushGateway: Send + Sync {
    fn send_push<'a>(
        &'a self,
        subscription: &'a PushSubscription,
        payload: &'a str,
    ) -> PushGatewayFuture<'a>;
}
