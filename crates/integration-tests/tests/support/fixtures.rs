#![allow(dead_code)]

use chrono::NaiveTime;
use shared::domain::day_template::{DayTemplate, HighLevelPlan, TimeBlock};
use shared::domain::routine::{RecurrenceFrequency, RecurrenceSchedule, RoutineDefinition, RoutineTaskTemplate};
use shared::domain::task::{TaskCategory, TaskFrequency};
use shared::domain::user::{
    CalendarEntryNotificationRule, CalendarEntryNotificationSettings, NotificationChannel, User,
    UserSettings,
};
use shared::repos::Store;
use uuid::Uuid;

pub const TEST_TIME_ZONE: &str = "UTC";

pub fn user_settings() -> UserSettings {
    UserSettings {
        time_zone: TEST_TIME_ZONE.to_string(),
        llm_provider: None,
        morning_overview_time_minutes: 7 * 60,
        calendar_entry_notification_settings: CalendarEntryNotificationSettings::default(),
        template_defaults: Default::default(),
    }
}

pub fn user_settings_with_push_reminder(minutes_before: i64) -> UserSettings {
    UserSettings {
        calendar_entry_notification_settings: CalendarEntryNotificationSettings {
            enabled: true,
            rules: vec![CalendarEntryNotificationRule {
                channel: NotificationChannel::Push,
                minutes_before,
            }],
        },
        ..user_settings()
    }
}

pub async fn insert_user(store: &Store, user_id: Uuid, settings: UserSettings) {
    let user = User::create(user_id, settings);
    store.upsert_user(&user).await.expect("user insert should succeed");
}

/// Inserts a Day Template with `weekday`'s default set to it and two
/// `Work` time blocks — the scenario-1 fixture shape (spec §8.3 #1).
pub async fn insert_two_block_template(store: &Store, user_id: Uuid, slug: &str) -> DayTemplate {
    let mut template = DayTemplate::create(user_id, slug.to_string());
    template.set_time_blocks(vec![
        TimeBlock {
            time_block_def_id: Uuid::new_v4(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).expect("valid time"),
            name: "Work".to_string(),
        },
        TimeBlock {
            time_block_def_id: Uuid::new_v4(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).expect("valid time"),
            name: "Work".to_string(),
        },
    ]);
    template.set_high_level_plan(HighLevelPlan::default());
    store
        .upsert_day_template(&template)
        .await
        .expect("template insert should succeed");
    template
}

/// Inserts a daily routine with one HYGIENE-category task (spec §8.3 #1).
pub async fn insert_brush_teeth_routine(store: &Store, user_id: Uuid) -> RoutineDefinition {
    let routine = RoutineDefinition::create(
        Uuid::new_v4(),
        user_id,
        "Morning hygiene".to_string(),
        RecurrenceSchedule {
            frequency: RecurrenceFrequency::Daily,
            weekdays: Vec::new(),
            day_number: None,
        },
        vec![RoutineTaskTemplate {
            id: Uuid::new_v4(),
            name: "Brush teeth".to_string(),
            category: TaskCategory::from_str("HYGIENE"),
            task_type: "checklist".to_string(),
            frequency: TaskFrequency::Other("ONCE".to_string()),
            schedule: None,
            tags: Vec::new(),
        }],
    );
    store
        .upsert_routine_definition(&routine)
        .await
        .expect("routine insert should succeed");
    routine
}
