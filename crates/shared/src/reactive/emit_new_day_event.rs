use chrono::{DateTime, Utc};
use tracing::warn;

use crate::commands::CommandError;
use crate::domain::{DomainEvent, DomainEventKind, EntityKind};
use crate::event_dispatch::EventDispatcher;
use crate::pubsub::PubSubBus;
use crate::repos::Store;

/// `EMIT_NEW_DAY_EVENT` job body (spec §6.3, `5 3 * * *`). Like
/// `schedule_all_users_day`, a single job iterates every user directly.
/// `NewDay` is not a per-entity mutation (spec §6.2), so there is no
/// aggregate to route through a `UnitOfWork`: the event is published and
/// dispatched the same way `UnitOfWork::commit`'s post-commit step does it,
/// without the preceding transactional persistence step.
pub async fn emit_new_day_event(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    now: DateTime<Utc>,
) -> Result<usize, CommandError> {
    let user_ids = store.list_user_ids().await?;
    let mut emitted = 0;

    for user_id in user_ids {
        let event = DomainEvent {
            user_id,
            occurred_at: now,
            entity_type: EntityKind::User,
            entity_id: user_id,
            kind: DomainEventKind::NewDay,
        };

        if let Err(error) = pubsub.publish_domain_event(user_id, &event).await {
            warn!(%user_id, %error, "emit_new_day_event: pubsub publish failed");
        }
        dispatcher.dispatch(event).await;
        emitted += 1;
    }

    Ok(emitted)
}
