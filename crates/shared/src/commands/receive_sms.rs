use std::collections::HashMap;

use serde_json::json;
use uuid::Uuid;

use crate::domain::message::{Message, MessageRole};
use crate::event_dispatch::EventDispatcher;
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::uow::UnitOfWork;

use super::CommandError;

/// Ingests an inbound SMS as a `Message` and defers `ProcessInboundSmsMessage`
/// so the LLM use-case runner (spec §4.6) picks it up outside this
/// transaction (spec §2's "receive SMS" command handler).
pub async fn receive_sms(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    from_number: String,
    to_number: String,
    body: String,
) -> Result<Message, CommandError> {
    let mut meta = HashMap::new();
    meta.insert("from_number".to_string(), json!(from_number));
    meta.insert("to_number".to_string(), json!(to_number));

    let mut message = Message::create(
        Uuid::new_v4(),
        user_id,
        MessageRole::User,
        body,
        meta,
        Some("inbound_sms".to_string()),
    );

    let mut uow = UnitOfWork::begin(store, dispatcher, pubsub, user_id).await?;
    uow.add(&mut message);
    uow.workers()
        .schedule_process_inbound_sms_message(user_id, message.id);
    uow.commit().await?;

    Ok(message)
}
