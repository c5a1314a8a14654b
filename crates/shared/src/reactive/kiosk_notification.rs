use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::error;
use uuid::Uuid;

use crate::commands::CommandError;
use crate::llm::{
    AssistantCapability, DecideNotificationArgs, LlmExecutionSource, LlmGateway, LlmUseCase,
    PromptTemplate, ToolError, ToolInvokeFuture, ToolSpec, run_use_case, template_for_capability,
};
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::timezone::{local_day_bounds_utc, user_local_date};

struct KioskNotificationUseCase;

impl LlmUseCase for KioskNotificationUseCase {
    fn prompt_template(&self) -> PromptTemplate {
        template_for_capability(AssistantCapability::KioskNotification)
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new::<DecideNotificationArgs>(
            "decide_notification",
            "Decide whether to read a notification aloud on the kiosk right now.",
        )]
    }

    fn invoke_tool<'a>(&'a self, name: &str, arguments: Value) -> ToolInvokeFuture<'a> {
        let name = name.to_string();
        Box::pin(async move {
            if name != "decide_notification" {
                return Err(ToolError::Failed(format!("unknown tool {name}")));
            }
            let args: DecideNotificationArgs =
                serde_json::from_value(arguments).map_err(|err| ToolError::Failed(err.to_string()))?;
            serde_json::to_value(&args).map_err(|err| ToolError::Failed(err.to_string()))
        })
    }
}

/// `KIOSK_NOTIFICATION_TICK` job body (spec §4.5.6): same decision tool as
/// smart notifications, but the result is published verbatim on the kiosk
/// pub/sub channel instead of being persisted as a `PushNotification`.
pub async fn kiosk_notification(
    store: Store,
    pubsub: &PubSubBus,
    user_id: Uuid,
    now: DateTime<Utc>,
    gateway: &dyn LlmGateway,
) -> Result<bool, CommandError> {
    let user = store.find_user(user_id).await?.ok_or(CommandError::NotFound)?;
    let today = user_local_date(now, &user.settings.time_zone);
    let day_end = local_day_bounds_utc(today, &user.settings.time_zone)
        .map(|(_, end)| end)
        .unwrap_or(now + Duration::hours(24));

    let tasks = store.list_tasks_for_date(user_id, today).await?;
    let calendar_entries = store
        .list_calendar_entries_starting_between(user_id, now, day_end)
        .await?;

    let referenced_entity_ids = tasks
        .iter()
        .map(|task| task.id)
        .chain(calendar_entries.iter().map(|entry| entry.id))
        .collect::<Vec<_>>();

    let context_payload = json!({
        "now": now,
        "tasks": tasks,
        "calendar_entries": calendar_entries,
    });

    let use_case = KioskNotificationUseCase;
    let snapshot = run_use_case(
        gateway,
        LlmExecutionSource::WorkerKioskNotification,
        &use_case,
        context_payload,
        referenced_entity_ids,
        Some(&user_id.to_string()),
    )
    .await
    .map_err(|err| CommandError::Gateway(err.to_string()))?;

    let Some(decision) = snapshot.tool_calls.first().map(|call| call.result.clone()) else {
        return Ok(false);
    };

    let should_notify = decision
        .get("should_notify")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let priority = decision
        .get("priority")
        .and_then(Value::as_str)
        .unwrap_or("low")
        .to_string();
    let message = decision
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if !should_notify || priority == "low" {
        return Ok(false);
    }

    let message_hash = format!("{:x}", Sha256::digest(message.as_bytes()));
    let payload = json!({
        "message": message,
        "priority": priority,
        "reason": decision.get("reason"),
        "message_hash": message_hash,
    });

    if let Err(error) = pubsub.publish_kiosk_notification(user_id, &payload).await {
        error!(user_id = %user_id, %error, "failed to publish kiosk notification");
        return Ok(false);
    }

    Ok(true)
}
