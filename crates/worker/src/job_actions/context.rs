use shared::config::WorkerConfig;
use shared::event_dispatch::EventDispatcher;
use shared::gateways::{CalendarGateway, PushGateway, SmsGateway};
use shared::llm::LlmGateway;
use shared::pubsub::PubSubBus;
use shared::repos::Store;

pub(crate) struct JobActionContext<'a> {
    pub(crate) store: &'a Store,
    pub(crate) dispatcher: &'a EventDispatcher,
    pub(crate) pubsub: &'a PubSubBus,
    pub(crate) config: &'a WorkerConfig,
    pub(crate) llm_gateway: &'a dyn LlmGateway,
    pub(crate) calendar_gateway: &'a dyn CalendarGateway,
    pub(crate) sms_gateway: &'a dyn SmsGateway,
    pub(crate) push_gateway: &'a dyn PushGateway,
}
