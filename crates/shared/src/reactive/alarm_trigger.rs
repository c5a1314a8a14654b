use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::commands::CommandError;
use crate::event_dispatch::EventDispatcher;
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::timezone::user_local_date;
use crate::uow::UnitOfWork;

/// `ALARM_TICK` job body (spec §4.5.1): triggers every alarm on today's Day
/// that is due at or before `now`, emitting one `AlarmTriggeredEvent` per
/// alarm. No Day for today is a recoverable no-op, not an error — the user
/// may simply not have scheduled a day yet.
pub async fn alarm_trigger(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<usize, CommandError> {
    let user = store.find_user(user_id).await?.ok_or(CommandError::NotFound)?;
    let today = user_local_date(now, &user.settings.time_zone);

    let Some(mut day) = store.find_day(user_id, today).await? else {
        return Ok(0);
    };

    let triggered = day.trigger_due_alarms(now);
    if triggered.is_empty() {
        return Ok(0);
    }

    let mut uow = UnitOfWork::begin(store, dispatcher, pubsub, user_id).await?;
    uow.add(&mut day);
    uow.commit().await?;

    Ok(triggered.len())
}
