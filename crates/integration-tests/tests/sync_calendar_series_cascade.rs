mod support;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use shared::commands::sync_calendar;
use shared::domain::EntityKind;
use shared::domain::calendar::AttendanceStatus;
use shared::domain::task::{TaskCategory, TaskFrequency};
use shared::event_dispatch::{EventDispatcher, HandlerContext};
use shared::gateways::{CalendarEntryUpstream, CalendarSeriesUpstream, CalendarSyncResult};
use shared::pubsub::PubSubBus;
use shared::repos::AuditLogFilter;
use uuid::Uuid;

use support::fixtures::{insert_user, user_settings};
use support::gateways::{RecordingPushGateway, StubCalendarGateway};
use support::test_redis_url;

const PLATFORM: &str = "google";
const SERIES_PLATFORM_ID: &str = "series-1";

fn entry(platform_id: &str, name: &str, starts_at_day: u32) -> CalendarEntryUpstream {
    let starts_at = Utc.with_ymd_and_hms(2025, 1, starts_at_day, 9, 0, 0).unwrap();
    CalendarEntryUpstream {
        platform_id: platform_id.to_string(),
        series_platform_id: Some(SERIES_PLATFORM_ID.to_string()),
        name: name.to_string(),
        frequency: TaskFrequency::Other("WEEKLY".to_string()),
        category: TaskCategory::from_str("WORK"),
        starts_at,
        ends_at: starts_at + chrono::Duration::hours(1),
        attendance_status: AttendanceStatus::Going,
    }
}

/// Spec §8.3 scenario 3: renaming an upstream series cascades its new name
/// onto every live entry, emitting exactly one `CalendarEntrySeriesUpdated`
/// event and one `CalendarEntryUpdated` event per entry.
#[tokio::test]
async fn series_rename_cascades_to_every_entry() {
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

    let initial_result = CalendarSyncResult {
        series_upserts: vec![CalendarSeriesUpstream {
            series_platform_id: SERIES_PLATFORM_ID.to_string(),
            name: "Old Series".to_string(),
            frequency: TaskFrequency::Other("WEEKLY".to_string()),
            category: TaskCategory::from_str("WORK"),
            starts_at: Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap(),
            ends_at: None,
        }],
        entry_upserts: vec![entry("entry-1", "Old Series", 2), entry("entry-2", "Old Series", 3)],
        ..Default::default()
    };
    let gateway = StubCalendarGateway::new(initial_result);
    sync_calendar(
        store.clone(),
        &dispatcher,
        &pubsub,
        user_id,
        PLATFORM,
        "primary",
        &gateway,
    )
    .await
    .expect("initial sync should succeed");

    let rename_result = CalendarSyncResult {
        series_upserts: vec![CalendarSeriesUpstream {
            series_platform_id: SERIES_PLATFORM_ID.to_string(),
            name: "New Series".to_string(),
            frequency: TaskFrequency::Other("WEEKLY".to_string()),
            category: TaskCategory::from_str("WORK"),
            starts_at: Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap(),
            ends_at: None,
        }],
        entry_upserts: vec![entry("entry-1", "Old Series", 2), entry("entry-2", "Old Series", 3)],
        ..Default::default()
    };
    let gateway = StubCalendarGateway::new(rename_result);
    sync_calendar(
        store.clone(),
        &dispatcher,
        &pubsub,
        user_id,
        PLATFORM,
        "primary",
        &gateway,
    )
    .await
    .expect("rename sync should succeed");

    let entries = store
        .list_calendar_entries_for_series(shared::ids::calendar_entry_series_id(
            PLATFORM,
            SERIES_PLATFORM_ID,
        ))
        .await
        .expect("entry listing should succeed");
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|entry| entry.name == "New Series"));

    let series_events = store
        .list_audit_logs(user_id, &AuditLogFilter { entity_type: Some(EntityKind::CalendarEntrySeries), limit: 100, ..Default::default() })
        .await
        .expect("audit log listing should succeed");
    let series_updated_count = series_events
        .iter()
        .filter(|log| log.activity_type == "CalendarEntrySeriesUpdatedEvent")
        .count();
    assert_eq!(series_updated_count, 1);

    let entry_events = store
        .list_audit_logs(user_id, &AuditLogFilter { entity_type: Some(EntityKind::CalendarEntry), limit: 100, ..Default::default() })
        .await
        .expect("audit log listing should succeed");
    let entry_updated_count = entry_events
        .iter()
        .filter(|log| log.activity_type == "CalendarEntryUpdatedEvent")
        .count();
    assert_eq!(entry_updated_count, 2);
}
