use chrono::Utc;
use serde_json::Value;
use shared::commands::{self, CommandError};
use shared::reactive;
use shared::repos::{ClaimedJob, JobType};
use tracing::warn;
use uuid::Uuid;

use crate::{JobExecutionError, WorkerTickMetrics};

mod context;

pub(crate) use context::JobActionContext;

/// Dispatches one claimed job to its reactive handler or command, keyed on
/// `job.job_type` (SPEC_FULL.md's cron fan-out mechanics, mirroring the
/// teacher's own job-type dispatch match).
pub(crate) async fn dispatch_job_action(
    ctx: JobActionContext<'_>,
    job: &ClaimedJob,
    _metrics: &mut WorkerTickMetrics,
) -> Result<(), JobExecutionError> {
    let now = Utc::now();

    let result = match job.job_type {
        JobType::ScheduleAllUsersDay => {
            reactive::schedule_all_users_day(ctx.store.clone(), ctx.dispatcher, ctx.pubsub, now)
                .await
                .map(|_| ())
        }
        JobType::EmitNewDayEvent => {
            reactive::emit_new_day_event(ctx.store.clone(), ctx.dispatcher, ctx.pubsub, now)
                .await
                .map(|_| ())
        }
        JobType::AlarmTick => {
            reactive::alarm_trigger(ctx.store.clone(), ctx.dispatcher, ctx.pubsub, job.user_id, now)
                .await
                .map(|_| ())
        }
        JobType::CalendarEntryReminderTick => reactive::calendar_reminder(
            ctx.store.clone(),
            ctx.dispatcher,
            ctx.pubsub,
            job.user_id,
            now,
            ctx.push_gateway,
            ctx.sms_gateway,
        )
        .await
        .map(|_| ()),
        JobType::MorningOverviewTick => reactive::morning_overview(
            ctx.store.clone(),
            ctx.dispatcher,
            ctx.pubsub,
            job.user_id,
            now,
            ctx.llm_gateway,
            ctx.push_gateway,
        )
        .await
        .map(|_| ()),
        JobType::SmartNotificationTick => reactive::smart_notification(
            ctx.store.clone(),
            ctx.dispatcher,
            ctx.pubsub,
            job.user_id,
            now,
            ctx.llm_gateway,
            ctx.push_gateway,
            ctx.config,
        )
        .await
        .map(|_| ()),
        JobType::KioskNotificationTick => {
            reactive::kiosk_notification(ctx.store.clone(), ctx.pubsub, job.user_id, now, ctx.llm_gateway)
                .await
                .map(|_| ())
        }
        JobType::ProcessBrainDumpItem => {
            let item_id = payload_uuid(job, "item_id")?;
            reactive::process_brain_dump_item(
                ctx.store.clone(),
                ctx.dispatcher,
                ctx.pubsub,
                job.user_id,
                item_id,
                ctx.llm_gateway,
            )
            .await
            .map(|_| ())
        }
        JobType::ProcessInboundSmsMessage => {
            let message_id = payload_uuid(job, "message_id")?;
            reactive::process_inbound_sms_message(
                ctx.store.clone(),
                ctx.dispatcher,
                ctx.pubsub,
                job.user_id,
                message_id,
                ctx.llm_gateway,
            )
            .await
            .map(|_| ())
        }
        JobType::SendSmsMessage => {
            let message_id = payload_uuid(job, "message_id")?;
            send_sms_message(ctx.store, job.user_id, message_id, ctx.sms_gateway).await
        }
        JobType::SendPushNotification => {
            warn!(
                job_id = %job.id,
                "SEND_PUSH_NOTIFICATION job claimed but no producer schedules one yet; every \
                 current push path sends inline via commands::send_push_notification"
            );
            Ok(())
        }
        JobType::SyncCalendar => {
            let platform = payload_str(job, "platform")?;
            let calendar_id = payload_str(job, "calendar_id")?;
            commands::sync_calendar(
                ctx.store.clone(),
                ctx.dispatcher,
                ctx.pubsub,
                job.user_id,
                &platform,
                &calendar_id,
                ctx.calendar_gateway,
            )
            .await
        }
    };

    result.map_err(command_error_to_job_error)
}

async fn send_sms_message(
    store: &shared::repos::Store,
    user_id: Uuid,
    message_id: Uuid,
    sms_gateway: &dyn shared::gateways::SmsGateway,
) -> Result<(), CommandError> {
    let Some(message) = store.find_message(message_id).await? else {
        return Ok(());
    };
    if message.user_id != user_id {
        return Ok(());
    }

    let Some(phone) = message.meta.get("to_number").and_then(Value::as_str) else {
        warn!(%message_id, "SEND_SMS_MESSAGE job has no to_number on its message's meta");
        return Ok(());
    };

    sms_gateway
        .send_message(phone, &message.content)
        .await
        .map_err(|err| CommandError::Gateway(err.to_string()))
}

fn payload_uuid(job: &ClaimedJob, field: &str) -> Result<Uuid, JobExecutionError> {
    job.payload
        .as_ref()
        .and_then(|payload| payload.get(field))
        .and_then(Value::as_str)
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or_else(|| {
            JobExecutionError::permanent(
                "MISSING_JOB_PAYLOAD_FIELD",
                format!("job {} missing uuid payload field {field}", job.id),
            )
        })
}

fn payload_str(job: &ClaimedJob, field: &str) -> Result<String, JobExecutionError> {
    job.payload
        .as_ref()
        .and_then(|payload| payload.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            JobExecutionError::permanent(
                "MISSING_JOB_PAYLOAD_FIELD",
                format!("job {} missing string payload field {field}", job.id),
            )
        })
}

fn command_error_to_job_error(error: CommandError) -> JobExecutionError {
    match error {
        CommandError::NotFound => JobExecutionError::permanent("NOT_FOUND", error.to_string()),
        CommandError::Validation(_) => {
            JobExecutionError::permanent("VALIDATION_FAILED", error.to_string())
        }
        CommandError::TokenExpired => {
            JobExecutionError::permanent("TOKEN_EXPIRED", error.to_string())
        }
        CommandError::Gateway(_) => JobExecutionError::transient("GATEWAY_ERROR", error.to_string()),
        CommandError::Internal(_) => JobExecutionError::transient("STORE_ERROR", error.to_string()),
    }
}
