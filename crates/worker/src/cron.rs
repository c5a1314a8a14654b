//! Cron fan-out (spec §6.3, SPEC_FULL.md's "[AMBIENT] Cron fan-out
//! mechanics"). The worker runs one base ticker every 60 seconds; each tick
//! checks the current UTC minute against the five fixed expressions below
//! and enqueues one job per matching user. This is a closed, known set of
//! five schedules, not a general cron parser.

use chrono::{DateTime, Timelike, Utc};
use shared::repos::{JobType, Store};
use tracing::{error, info};
use uuid::Uuid;

/// Sentinel `user_id` for the two daily jobs that are not per-user
/// fan-out: they each iterate every user internally (see
/// `shared::reactive::schedule_all_users_day`/`emit_new_day_event`), so the
/// job row they ride on carries no single owning user.
pub(crate) const SYSTEM_JOB_USER_ID: Uuid = Uuid::nil();

fn matches_every_minute(_now: DateTime<Utc>) -> bool {
    true
}

fn matches_every_15_minutes(now: DateTime<Utc>) -> bool {
    now.minute() % 15 == 0
}

fn matches_notification_minutes(now: DateTime<Utc>) -> bool {
    matches!(now.minute(), 0 | 19 | 20 | 30 | 50)
}

fn matches_schedule_all_users_day(now: DateTime<Utc>) -> bool {
    now.hour() == 3 && now.minute() == 0
}

fn matches_emit_new_day_event(now: DateTime<Utc>) -> bool {
    now.hour() == 3 && now.minute() == 5
}

/// Runs once per base tick. Enqueues the per-user jobs for every cron
/// expression that matches `now`'s minute, logging and continuing past a
/// single enqueue failure rather than aborting the whole tick.
pub(crate) async fn run_cron_tick(store: &Store, now: DateTime<Utc>) {
    let mut per_user_job_types = Vec::new();
    if matches_every_minute(now) {
        per_user_job_types.push(JobType::AlarmTick);
        per_user_job_types.push(JobType::CalendarEntryReminderTick);
    }
    if matches_every_15_minutes(now) {
        per_user_job_types.push(JobType::MorningOverviewTick);
    }
    if matches_notification_minutes(now) {
        per_user_job_types.push(JobType::SmartNotificationTick);
        per_user_job_types.push(JobType::KioskNotificationTick);
    }

    if !per_user_job_types.is_empty() {
        let user_ids = match store.list_user_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                error!("cron: failed to list user ids: {err}");
                return;
            }
        };

        for user_id in user_ids {
            for job_type in &per_user_job_types {
                if let Err(err) = store.enqueue_job(user_id, *job_type, now, None).await {
                    error!(%user_id, job_type = job_type.as_str(), "cron: failed to enqueue job: {err}");
                }
            }
        }
    }

    if matches_schedule_all_users_day(now)
        && let Err(err) = store
            .enqueue_job(SYSTEM_JOB_USER_ID, JobType::ScheduleAllUsersDay, now, None)
            .await
    {
        error!("cron: failed to enqueue schedule-all-users-day: {err}");
    }

    if matches_emit_new_day_event(now)
        && let Err(err) = store
            .enqueue_job(SYSTEM_JOB_USER_ID, JobType::EmitNewDayEvent, now, None)
            .await
    {
        error!("cron: failed to enqueue emit-new-day-event: {err}");
    }

    info!(minute = now.minute(), "cron tick complete");
}
