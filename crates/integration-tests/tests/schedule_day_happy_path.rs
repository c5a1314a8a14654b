mod support;

use std::sync::Arc;

use chrono::NaiveDate;
use shared::commands::schedule_day;
use shared::domain::day::DayStatus;
use shared::event_dispatch::{EventDispatcher, HandlerContext};
use shared::pubsub::PubSubBus;
use uuid::Uuid;

use support::fixtures::{insert_brush_teeth_routine, insert_two_block_template, insert_user, user_settings};
use support::gateways::RecordingPushGateway;
use support::test_redis_url;

/// Spec §8.3 scenario 1: a template with two `Work` blocks plus one daily
/// routine with a single HYGIENE task produces a scheduled Day whose tasks
/// and time blocks mirror the template and routine exactly.
#[tokio::test]
async fn schedule_day_materializes_template_and_routine_tasks() {
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
    let mut settings = user_settings();
    let date = NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date");
    settings.template_defaults[shared::timezone::weekday_index(date)] = Some("default".to_string());
    insert_user(&store, user_id, settings).await;

    insert_two_block_template(&store, user_id, "default").await;
    let routine = insert_brush_teeth_routine(&store, user_id).await;

    let day = schedule_day(store.clone(), &dispatcher, &pubsub, user_id, date, None)
        .await
        .expect("schedule_day should succeed");

    assert_eq!(day.status, DayStatus::Scheduled);
    assert_eq!(day.time_blocks.len(), 2);
    assert!(day.time_blocks.iter().all(|block| block.name == "Work"));

    let tasks = store
        .list_tasks_for_date(user_id, date)
        .await
        .expect("task listing should succeed");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "Brush teeth");
    assert_eq!(tasks[0].routine_definition_id, Some(routine.id));
    assert_eq!(
        tasks[0].status,
        shared::domain::task::TaskStatus::NotStarted
    );
}
