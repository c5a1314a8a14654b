use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::commands::CommandError;
use crate::commands::send_push_notification;
use crate::domain::calendar::AttendanceStatus;
use crate::domain::message::{Message, MessageRole};
use crate::domain::user::NotificationChannel;
use crate::event_dispatch::EventDispatcher;
use crate::gateways::{PushGateway, SmsGateway};
use crate::ids::calendar_kiosk_alarm_id;
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::timezone::user_local_date;
use crate::uow::UnitOfWork;

const LOOKAHEAD_HOURS: i64 = 48;
const TRIGGER_WINDOW_SECONDS: i64 = 60;

/// Looks up the phone number to reply to from the most recent inbound SMS
/// thread on file — there is no dedicated "user phone number" field, only
/// the numbers observed on past `Message` rows (spec §4.4's out-of-scope
/// phone verification / `receive_sms`'s `from_number` meta).
async fn destination_phone_number(store: &Store, user_id: Uuid) -> Result<Option<String>, CommandError> {
    let messages = store.list_messages(user_id, 50).await?;
    Ok(messages.iter().find_map(|message| {
        message
            .meta
            .get("from_number")
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }))
}

/// `CALENDAR_ENTRY_REMINDER_TICK` job body (spec §4.5.2): for every
/// configured reminder rule, finds upcoming calendar entries whose trigger
/// time (`starts_at - minutes_before`) falls in the current minute and fans
/// the reminder out over the rule's channel. Each (entry, rule) pair is
/// deduplicated through `outbound_action_idempotency` so an at-least-once
/// job retry can never double-send.
pub async fn calendar_reminder(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    now: DateTime<Utc>,
    push_gateway: &dyn PushGateway,
    sms_gateway: &dyn SmsGateway,
) -> Result<usize, CommandError> {
    let user = store.find_user(user_id).await?.ok_or(CommandError::NotFound)?;
    if !user.settings.calendar_entry_notification_settings.enabled {
        return Ok(0);
    }

    let window_start = now;
    let window_end = now + Duration::hours(LOOKAHEAD_HOURS);
    let entries = store
        .list_calendar_entries_starting_between(user_id, window_start, window_end)
        .await?;

    let mut dispatched = 0usize;
    for rule in &user.settings.calendar_entry_notification_settings.rules {
        for entry in &entries {
            if entry.attendance_status == AttendanceStatus::NotGoing {
                continue;
            }

            let trigger_time = entry.starts_at - Duration::minutes(rule.minutes_before);
            if now < trigger_time || now >= trigger_time + Duration::seconds(TRIGGER_WINDOW_SECONDS) {
                continue;
            }

            let action_key = format!(
                "calendar_entry_reminder:{}:{}:{}",
                entry.id,
                rule.minutes_before,
                rule.channel.as_str()
            );
            let claimed = store
                .record_outbound_action_idempotency(user_id, &action_key, Uuid::new_v4())
                .await?;
            if !claimed {
                continue;
            }

            let content = format!(
                "Reminder: {} starts in {} minutes",
                entry.name, rule.minutes_before
            );

            match rule.channel {
                NotificationChannel::Push => {
                    send_push_notification(
                        store.clone(),
                        dispatcher,
                        pubsub,
                        user_id,
                        content,
                        Some(action_key),
                        push_gateway,
                    )
                    .await?;
                }
                NotificationChannel::Text => {
                    let Some(phone) = destination_phone_number(&store, user_id).await? else {
                        continue;
                    };
                    sms_gateway
                        .send_message(&phone, &content)
                        .await
                        .map_err(|error| CommandError::Gateway(error.to_string()))?;

                    let mut message = Message::create(
                        Uuid::new_v4(),
                        user_id,
                        MessageRole::Assistant,
                        content,
                        HashMap::new(),
                        Some(action_key),
                    );
                    let mut uow = UnitOfWork::begin(store.clone(), dispatcher, pubsub, user_id).await?;
                    uow.add(&mut message);
                    uow.commit().await?;
                }
                NotificationChannel::KioskAlarm => {
                    let today = user_local_date(now, &user.settings.time_zone);
                    let Some(mut day) = store.find_day(user_id, today).await? else {
                        continue;
                    };
                    let alarm_id = calendar_kiosk_alarm_id(entry.id, entry.starts_at, rule.minutes_before);
                    day.emit_synthetic_kiosk_alarm(alarm_id);

                    let mut uow = UnitOfWork::begin(store.clone(), dispatcher, pubsub, user_id).await?;
                    uow.add(&mut day);
                    uow.commit().await?;
                }
            }

            dispatched += 1;
        }
    }

    Ok(dispatched)
}
