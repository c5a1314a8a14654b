use chrono::{DateTime, Utc};
use tracing::warn;

use crate::commands::{CommandError, schedule_day};
use crate::event_dispatch::EventDispatcher;
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::timezone::user_local_date;

/// `SCHEDULE_ALL_USERS_DAY` job body (spec §6.3, `0 3 * * *`). Unlike the
/// other reactive handlers this one is not itself fanned out per user — the
/// cron tick enqueues exactly one of these jobs, and it iterates every user
/// directly, logging and continuing past a single user's failure rather
/// than aborting the whole run.
pub async fn schedule_all_users_day(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    now: DateTime<Utc>,
) -> Result<usize, CommandError> {
    let user_ids = store.list_user_ids().await?;
    let mut scheduled = 0;

    for user_id in user_ids {
        let user = match store.find_user(user_id).await? {
            Some(user) => user,
            None => continue,
        };
        let today = user_local_date(now, &user.settings.time_zone);

        match schedule_day(store.clone(), dispatcher, pubsub, user_id, today, None).await {
            Ok(_) => scheduled += 1,
            Err(error) => warn!(%user_id, %error, "schedule_all_users_day: failed for user"),
        }
    }

    Ok(scheduled)
}
