mod support;

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use shared::commands::sync_calendar;
use shared::domain::push::PushSubscription;
use shared::domain::task::{TaskCategory, TaskFrequency};
use shared::event_dispatch::{EventDispatcher, HandlerContext};
use shared::gateways::{CalendarEntryUpstream, CalendarSeriesUpstream, CalendarSyncResult};
use shared::pubsub::PubSubBus;
use shared::reactive::calendar_reminder;
use uuid::Uuid;

use support::fixtures::{insert_user, user_settings_with_push_reminder};
use support::gateways::{RecordingPushGateway, RecordingSmsGateway, StubCalendarGateway};
use support::test_redis_url;

/// Spec §8.3 scenario 4: a PUSH reminder rule fires exactly once for a
/// calendar entry whose trigger time falls inside the current tick window.
#[tokio::test]
async fn push_reminder_fires_within_trigger_window() {
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
    let minutes_before = 30;
    insert_user(&store, user_id, user_settings_with_push_reminder(minutes_before)).await;

    let subscription = PushSubscription::create(
        Uuid::new_v4(),
        user_id,
        "https://push.example/endpoint".to_string(),
        "p256dh-key".to_string(),
        "auth-secret".to_string(),
    );
    store
        .upsert_push_subscription(&subscription)
        .await
        .expect("subscription insert should succeed");

    let now = Utc::now();
    let starts_at = now + Duration::minutes(minutes_before);
    let sync_result = CalendarSyncResult {
        series_upserts: vec![CalendarSeriesUpstream {
            series_platform_id: "series-1".to_string(),
            name: "Team Sync".to_string(),
            frequency: TaskFrequency::Other("WEEKLY".to_string()),
            category: TaskCategory::from_str("WORK"),
            starts_at,
            ends_at: None,
        }],
        entry_upserts: vec![CalendarEntryUpstream {
            platform_id: "entry-1".to_string(),
            series_platform_id: Some("series-1".to_string()),
            name: "Team Sync".to_string(),
            frequency: TaskFrequency::Other("WEEKLY".to_string()),
            category: TaskCategory::from_str("WORK"),
            starts_at,
            ends_at: starts_at + Duration::hours(1),
            attendance_status: shared::domain::calendar::AttendanceStatus::Going,
        }],
        ..Default::default()
    };
    let calendar_gateway = StubCalendarGateway::new(sync_result);
    sync_calendar(
        store.clone(),
        &dispatcher,
        &pubsub,
        user_id,
        "google",
        "primary",
        &calendar_gateway,
    )
    .await
    .expect("sync should succeed");

    let push_gateway = RecordingPushGateway::new();
    let sms_gateway = RecordingSmsGateway::new();
    let dispatched = calendar_reminder(
        store.clone(),
        &dispatcher,
        &pubsub,
        user_id,
        now,
        &push_gateway,
        &sms_gateway,
    )
    .await
    .expect("calendar_reminder should succeed");

    assert_eq!(dispatched, 1);
    let sent = push_gateway.sent_payloads();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Team Sync"));

    let notifications = store
        .list_push_notifications(user_id, 10)
        .await
        .expect("notification listing should succeed");
    assert_eq!(notifications.len(), 1);
    assert!(
        notifications[0]
            .triggered_by
            .as_deref()
            .is_some_and(|value| value.starts_with("calendar_entry_reminder:"))
    );
}
