mod support;

use std::sync::Arc;

use chrono::NaiveDate;
use shared::commands::schedule_day;
use shared::domain::task::{Task, TaskCategory, TaskFrequency};
use shared::event_dispatch::{EventDispatcher, HandlerContext};
use shared::pubsub::PubSubBus;
use uuid::Uuid;

use support::fixtures::{insert_two_block_template, insert_user, user_settings};
use support::gateways::RecordingPushGateway;
use support::test_redis_url;

/// Spec §8.3 scenario 2: an adhoc task (no `routine_definition_id`) survives
/// a second `schedule_day` call while routine-sourced tasks are replaced.
#[tokio::test]
async fn adhoc_task_survives_reschedule() {
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
    let date = NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date");
    insert_user(&store, user_id, user_settings()).await;
    insert_two_block_template(&store, user_id, "default").await;

    let adhoc_task = Task::create(
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
    store
        .upsert_task(&adhoc_task)
        .await
        .expect("adhoc task insert should succeed");

    schedule_day(
        store.clone(),
        &dispatcher,
        &pubsub,
        user_id,
        date,
        Some("default".to_string()),
    )
    .await
    .expect("schedule_day should succeed");

    schedule_day(
        store.clone(),
        &dispatcher,
        &pubsub,
        user_id,
        date,
        Some("default".to_string()),
    )
    .await
    .expect("second schedule_day should succeed");

    let tasks = store
        .list_tasks_for_date(user_id, date)
        .await
        .expect("task listing should succeed");

    assert!(
        tasks.iter().any(|task| task.id == adhoc_task.id && task.name == "Buy milk"),
        "adhoc task should still be present after rescheduling"
    );
}
