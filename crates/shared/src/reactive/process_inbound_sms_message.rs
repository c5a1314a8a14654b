use serde_json::{Value, json};
use uuid::Uuid;

use crate::commands::CommandError;
use crate::domain::message::{Message, MessageRole};
use crate::event_dispatch::EventDispatcher;
use crate::llm::{
    AssistantCapability, LlmExecutionSource, LlmGateway, LlmUseCase, PromptTemplate, ReplyToSmsArgs,
    ToolError, ToolInvokeFuture, ToolSpec, run_use_case, template_for_capability,
};
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::uow::UnitOfWork;

const REPLY_TRIGGERED_BY: &str = "inbound_sms_reply";

struct InboundSmsReplyUseCase;

impl LlmUseCase for InboundSmsReplyUseCase {
    fn prompt_template(&self) -> PromptTemplate {
        template_for_capability(AssistantCapability::InboundSmsReply)
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new::<ReplyToSmsArgs>(
            "reply_to_sms",
            "Decide whether an inbound text warrants an automated reply.",
        )]
    }

    fn invoke_tool<'a>(&'a self, name: &str, arguments: Value) -> ToolInvokeFuture<'a> {
        let name = name.to_string();
        Box::pin(async move {
            if name != "reply_to_sms" {
                return Err(ToolError::Failed(format!("unknown tool {name}")));
            }
            let args: ReplyToSmsArgs =
                serde_json::from_value(arguments).map_err(|err| ToolError::Failed(err.to_string()))?;
            serde_json::to_value(&args).map_err(|err| ToolError::Failed(err.to_string()))
        })
    }
}

/// `PROCESS_INBOUND_SMS_MESSAGE` job body: runs a single-tool LLM use case
/// over an inbound `Message` and, when the tool decides a reply is
/// warranted, stages an outbound assistant `Message` and defers
/// `SEND_SMS_MESSAGE` so the wire send happens outside this transaction
/// (spec §4.6/§4.7).
pub async fn process_inbound_sms_message(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    message_id: Uuid,
    gateway: &dyn LlmGateway,
) -> Result<Option<Uuid>, CommandError> {
    let Some(mut message) = store.find_message(message_id).await? else {
        return Ok(None);
    };
    if message.user_id != user_id {
        return Ok(None);
    }

    let recent_messages = store.list_messages(user_id, 10).await?;
    let context_payload = json!({
        "inbound_message": message.content,
        "from_number": message.meta.get("from_number"),
        "to_number": message.meta.get("to_number"),
        "recent_messages": recent_messages,
    });

    let use_case = InboundSmsReplyUseCase;
    let snapshot = run_use_case(
        gateway,
        LlmExecutionSource::WorkerProcessInboundSmsMessage,
        &use_case,
        context_payload,
        vec![message.id],
        Some(&user_id.to_string()),
    )
    .await
    .map_err(|err| CommandError::Gateway(err.to_string()))?;

    let decision = snapshot.tool_calls.first().map(|call| call.result.clone());
    let should_reply = decision
        .as_ref()
        .and_then(|decision| decision.get("should_reply"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    message.attach_llm_run_result(snapshot);

    let mut uow = UnitOfWork::begin(store, dispatcher, pubsub, user_id).await?;

    if !should_reply {
        uow.add(&mut message);
        uow.commit().await?;
        return Ok(None);
    }

    let reply_text = decision
        .as_ref()
        .and_then(|decision| decision.get("reply_text"))
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty());

    let Some(reply_text) = reply_text else {
        uow.add(&mut message);
        uow.commit().await?;
        return Ok(None);
    };

    let mut meta = std::collections::HashMap::new();
    if let Some(from_number) = message.meta.get("to_number").cloned() {
        meta.insert("from_number".to_string(), from_number);
    }
    if let Some(to_number) = message.meta.get("from_number").cloned() {
        meta.insert("to_number".to_string(), to_number);
    }

    let mut reply = Message::create(
        Uuid::new_v4(),
        user_id,
        MessageRole::Assistant,
        reply_text.to_string(),
        meta,
        Some(REPLY_TRIGGERED_BY.to_string()),
    );
    let reply_id = reply.id;

    uow.add(&mut message);
    uow.add(&mut reply);
    uow.workers().schedule_send_sms_message(user_id, reply_id);
    uow.commit().await?;

    Ok(Some(reply_id))
}
