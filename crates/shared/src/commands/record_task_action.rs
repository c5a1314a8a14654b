use serde_json::Value;
use uuid::Uuid;

use crate::domain::task::Task;
use crate::event_dispatch::EventDispatcher;
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::uow::UnitOfWork;

use super::CommandError;

/// Records a task action (`complete`, `punt`, …) and persists the resulting
/// status transition (spec §2's "record task action" command handler,
/// `Task::record_action`).
pub async fn record_task_action(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    task_id: Uuid,
    action: &str,
    now: chrono::DateTime<chrono::Utc>,
    meta: Value,
) -> Result<Task, CommandError> {
    let mut task = store.find_task(task_id).await?.ok_or(CommandError::NotFound)?;
    if task.user_id != user_id {
        return Err(CommandError::NotFound);
    }

    let mut uow = UnitOfWork::begin(store, dispatcher, pubsub, user_id).await?;
    task.record_action(action, now, meta);
    uow.add(&mut task);
    uow.commit().await?;

    Ok(task)
}
