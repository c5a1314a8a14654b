//! Process-wide in-process domain event dispatch (spec §4.2).
//!
//! Mirrors the teacher's `job_processing::process_claimed_job` catch-log-
//! continue shape, but for handlers invoked synchronously after a commit
//! instead of jobs pulled off a queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::error;

use crate::domain::DomainEvent;
use crate::gateways::PushGateway;
use crate::pubsub::PubSubBus;
use crate::repos::Store;

/// Read-only context handed to a handler factory on every dispatch: a
/// `Store` to read current state plus enough to open an independent UoW if
/// the handler needs to react with further writes (spec §4.2: "Handlers
/// themselves may open new UoWs — those are independent transactions"), and
/// the transport gateway the `AlarmTriggered` handler needs to actually
/// deliver a push (spec §4.5.1).
#[derive(Clone)]
pub struct HandlerContext {
    pub store: Store,
    pub pubsub: PubSubBus,
    pub push_gateway: Arc<dyn PushGateway>,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] crate::repos::StoreError),
    #[error(transparent)]
    Uow(#[from] crate::uow::UowError),
    #[error("gateway error: {0}")]
    Gateway(String),
}

/// One handler's registration: which event it cares about, and a factory
/// closure that builds the async invocation per dispatch. Built once at
/// process start and never mutated afterward (spec §4.2's "one-shot at
/// process start" registration rule).
pub struct HandlerRegistration {
    pub name: &'static str,
    matches: Box<dyn Fn(&DomainEvent) -> bool + Send + Sync>,
    invoke: Box<dyn Fn(HandlerContext, DomainEvent) -> HandlerFuture + Send + Sync>,
}

impl HandlerRegistration {
    pub fn new<M, I>(name: &'static str, matches: M, invoke: I) -> Self
    where
        M: Fn(&DomainEvent) -> bool + Send + Sync + 'static,
        I: Fn(HandlerContext, DomainEvent) -> HandlerFuture + Send + Sync + 'static,
    {
        Self {
            name,
            matches: Box::new(matches),
            invoke: Box::new(invoke),
        }
    }
}

/// Built once at startup from the process's handler registrations; shared
/// read-only thereafter (spec §5: "written once at startup and read
/// concurrently thereafter — no locking required after init").
pub struct EventDispatcher {
    context: HandlerContext,
    handlers: Vec<HandlerRegistration>,
}

impl EventDispatcher {
    pub fn new(context: HandlerContext, handlers: Vec<HandlerRegistration>) -> Self {
        Self { context, handlers }
    }

    /// Invokes every matching handler in registration order, awaiting each
    /// in turn (spec §4.2: "Dispatch is sequential by event"). Errors are
    /// caught and logged — never propagated to peer handlers or callers.
    pub async fn dispatch(&self, event: DomainEvent) {
        for handler in &self.handlers {
            if !(handler.matches)(&event) {
                continue;
            }
            let future = (handler.invoke)(self.context.clone(), event.clone());
            if let Err(error) = future.await {
                error!(
                    handler = handler.name,
                    activity_type = %event.activity_type(),
                    %error,
                    "domain event handler failed"
                );
            }
        }
    }
}
