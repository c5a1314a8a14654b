use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::commands::CommandError;
use crate::commands::send_push_notification;
use crate::config::WorkerConfig;
use crate::domain::push::PushNotification;
use crate::event_dispatch::EventDispatcher;
use crate::gateways::PushGateway;
use crate::llm::{
    AssistantCapability, DecideNotificationArgs, LlmExecutionSource, LlmGateway, LlmUseCase,
    PromptTemplate, ToolError, ToolInvokeFuture, ToolSpec, run_use_case, template_for_capability,
};
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::timezone::{local_day_bounds_utc, user_local_date};
use crate::uow::UnitOfWork;

const TRIGGERED_BY: &str = "smart_notification";

struct SmartNotificationUseCase;

impl LlmUseCase for SmartNotificationUseCase {
    fn prompt_template(&self) -> PromptTemplate {
        template_for_capability(AssistantCapability::SmartNotification)
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new::<DecideNotificationArgs>(
            "decide_notification",
            "Decide whether the user should be interrupted right now.",
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

/// `SMART_NOTIFICATION_TICK` job body (spec §4.5.3). Gated by
/// `SMART_NOTIFICATIONS_ENABLED`; runs a single-tool LLM use case that
/// decides whether to interrupt the user, then applies the subscriptions
/// and cooldown checks the tool's contract describes.
#[allow(clippy::too_many_arguments)]
pub async fn smart_notification(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    now: DateTime<Utc>,
    gateway: &dyn LlmGateway,
    push_gateway: &dyn PushGateway,
    config: &WorkerConfig,
) -> Result<Option<PushNotification>, CommandError> {
    if !config.smart_notifications_enabled {
        return Ok(None);
    }

    let user = store.find_user(user_id).await?.ok_or(CommandError::NotFound)?;
    let today = user_local_date(now, &user.settings.time_zone);
    let day_end = local_day_bounds_utc(today, &user.settings.time_zone)
        .map(|(_, end)| end)
        .unwrap_or(now + Duration::hours(24));

    let tasks = store.list_tasks_for_date(user_id, today).await?;
    let calendar_entries = store
        .list_calendar_entries_starting_between(user_id, now, day_end)
        .await?;
    let recent_messages = store.list_messages(user_id, 10).await?;

    let referenced_entity_ids = tasks
        .iter()
        .map(|task| task.id)
        .chain(calendar_entries.iter().map(|entry| entry.id))
        .collect::<Vec<_>>();

    let context_payload = json!({
        "now": now,
        "tasks": tasks,
        "calendar_entries": calendar_entries,
        "recent_messages": recent_messages,
    });

    let use_case = SmartNotificationUseCase;
    let snapshot = run_use_case(
        gateway,
        LlmExecutionSource::WorkerSmartNotification,
        &use_case,
        context_payload,
        referenced_entity_ids,
        Some(&user_id.to_string()),
    )
    .await
    .map_err(|err| CommandError::Gateway(err.to_string()))?;

    let Some(decision) = snapshot.tool_calls.first().map(|call| call.result.clone()) else {
        return Ok(None);
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
        return Ok(None);
    }

    let subscriptions = store.list_push_subscriptions(user_id).await?;
    if subscriptions.is_empty() {
        let mut notification = send_push_notification(
            store.clone(),
            dispatcher,
            pubsub,
            user_id,
            message,
            Some(TRIGGERED_BY.to_string()),
            push_gateway,
        )
        .await?;
        notification.attach_llm_run_result(snapshot);
        let mut uow = UnitOfWork::begin(store, dispatcher, pubsub, user_id).await?;
        uow.add(&mut notification);
        uow.commit().await?;
        return Ok(Some(notification));
    }

    if let Some(last_sent_at) = store
        .last_push_notification_sent_at(user_id, TRIGGERED_BY)
        .await?
        && now - last_sent_at < Duration::minutes(config.smart_notification_cooldown_minutes)
    {
        return Ok(None);
    }

    let mut notification = send_push_notification(
        store.clone(),
        dispatcher,
        pubsub,
        user_id,
        message,
        Some(TRIGGERED_BY.to_string()),
        push_gateway,
    )
    .await?;
    notification.attach_llm_run_result(snapshot);
    let mut uow = UnitOfWork::begin(store, dispatcher, pubsub, user_id).await?;
    uow.add(&mut notification);
    uow.commit().await?;

    Ok(Some(notification))
}
