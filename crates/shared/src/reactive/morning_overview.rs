use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::commands::CommandError;
use crate::commands::send_push_notification;
use crate::domain::push::PushNotification;
use crate::event_dispatch::EventDispatcher;
use crate::gateways::PushGateway;
use crate::llm::{
    AssistantCapability, GenerateOverviewArgs, LlmExecutionSource, LlmGateway, LlmUseCase,
    PromptTemplate, ToolError, ToolInvokeFuture, ToolSpec, run_use_case, template_for_capability,
};
use crate::pubsub::PubSubBus;
use crate::queries::task_risk::task_risk;
use crate::repos::Store;
use crate::timezone::{is_in_15_minute_bucket, local_day_bounds_utc, user_local_date};
use crate::uow::UnitOfWork;

const TRIGGERED_BY: &str = "morning_overview";
const TASK_RISK_LOOKBACK_DAYS: i64 = 14;

struct MorningOverviewUseCase;

impl LlmUseCase for MorningOverviewUseCase {
    fn prompt_template(&self) -> PromptTemplate {
        template_for_capability(AssistantCapability::MorningOverview)
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new::<GenerateOverviewArgs>(
            "generate_overview",
            "Compose the morning overview push-notification message.",
        )]
    }

    fn invoke_tool<'a>(&'a self, name: &str, arguments: Value) -> ToolInvokeFuture<'a> {
        let name = name.to_string();
        Box::pin(async move {
            if name != "generate_overview" {
                return Err(ToolError::Failed(format!("unknown tool {name}")));
            }
            let args: GenerateOverviewArgs =
                serde_json::from_value(arguments).map_err(|err| ToolError::Failed(err.to_string()))?;
            serde_json::to_value(&args).map_err(|err| ToolError::Failed(err.to_string()))
        })
    }
}

/// `MORNING_OVERVIEW_TICK` job body (spec §4.5.4, cron every 15 minutes).
/// Fires once the user's configured time falls in the current bucket, and
/// only when an LLM provider is configured; deduplicates against any
/// `morning_overview` push already sent today (user-local).
pub async fn morning_overview(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    now: DateTime<Utc>,
    gateway: &dyn LlmGateway,
    push_gateway: &dyn PushGateway,
) -> Result<Option<PushNotification>, CommandError> {
    let user = store.find_user(user_id).await?.ok_or(CommandError::NotFound)?;
    if user.settings.llm_provider.is_none() {
        return Ok(None);
    }

    if !is_in_15_minute_bucket(now, &user.settings.time_zone, user.settings.morning_overview_time_minutes) {
        return Ok(None);
    }

    let today = user_local_date(now, &user.settings.time_zone);
    if let Some(last_sent_at) = store.last_push_notification_sent_at(user_id, TRIGGERED_BY).await?
        && user_local_date(last_sent_at, &user.settings.time_zone) == today
    {
        return Ok(None);
    }

    let (day_start, day_end) = local_day_bounds_utc(today, &user.settings.time_zone)
        .unwrap_or((now, now + chrono::Duration::hours(24)));

    let tasks = store.list_tasks_for_date(user_id, today).await?;
    let calendar_entries = store
        .list_calendar_entries_starting_between(user_id, day_start, day_end)
        .await?;
    let risky_tasks = task_risk(&store, user_id, today, TASK_RISK_LOOKBACK_DAYS).await?;

    let referenced_entity_ids = tasks
        .iter()
        .map(|task| task.id)
        .chain(calendar_entries.iter().map(|entry| entry.id))
        .collect::<Vec<_>>();

    let context_payload = json!({
        "now": now,
        "tasks": tasks,
        "calendar_entries": calendar_entries,
        "at_risk_tasks": risky_tasks.iter().map(|risky| json!({
            "task": &risky.task,
            "completion_rate": risky.completion_rate,
            "score": risky.score,
        })).collect::<Vec<_>>(),
    });

    let use_case = MorningOverviewUseCase;
    let snapshot = run_use_case(
        gateway,
        LlmExecutionSource::WorkerMorningOverview,
        &use_case,
        context_payload,
        referenced_entity_ids,
        Some(&user_id.to_string()),
    )
    .await
    .map_err(|err| CommandError::Gateway(err.to_string()))?;

    let Some(message) = snapshot
        .tool_calls
        .first()
        .and_then(|call| call.result.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        return Ok(None);
    };

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
