mod support;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use shared::domain::task::{Task, TaskCategory, TaskFrequency};
use shared::event_dispatch::{EventDispatcher, HandlerContext};
use shared::pubsub::PubSubBus;
use shared::queries::incremental_changes;
use shared::uow::UnitOfWork;
use uuid::Uuid;

use support::fixtures::{insert_user, user_settings};
use support::gateways::RecordingPushGateway;
use support::test_redis_url;

/// Spec §8.3 scenario 6: a task created after `T0` shows up as a single
/// `created` change in the incremental sync feed for that day.
#[tokio::test]
async fn task_created_after_checkpoint_appears_as_incremental_change() {
    let store = support::test_store().await;
    let pubsub = PubSubBus::connect(&test_redis_url())
        .await
        .expect("redis connection should succeed");
    let dispatcher = EventDispatcher::new(
        HandlerContext {
            store: store.clone(),
            pubsub: pubsub.clone(),
            push_gateway: Arc::new(RecordingPushGateway::new()),
        },
        Vec::new(),
    );

    let user_id = Uuid::new_v4();
    insert_user(&store, user_id, user_settings()).await;

    let since = Utc::now();
    let date = NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date");

    let mut task = Task::create(
        Uuid::new_v4(),
        user_id,
        date,
        "Buy milk".to_string(),
        TaskCategory::from_str("ERRAND"),
        "checklist".to_string(),
        TaskFrequency::Other("ONCE".to_string()),
        None,
        None,
        Vec::new(),
    );
    let mut uow = UnitOfWork::begin(store.clone(), &dispatcher, &pubsub, user_id)
        .await
        .expect("unit of work should begin");
    uow.add(&mut task);
    uow.commit().await.expect("task creation should commit");

    let changes = incremental_changes(&store, user_id, since, date)
        .await
        .expect("incremental_changes should succeed");

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, "created");
    assert_eq!(changes[0].entity_type, "Task");
    assert_eq!(changes[0].entity_id, task.id);
    let entity_data = changes[0]
        .entity_data
        .as_ref()
        .expect("created change should carry entity data");
    assert_eq!(
        entity_data.get("name").and_then(|value| value.as_str()),
        Some("Buy milk")
    );
}
