use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::brain_dump::BrainDumpItem;
use crate::domain::calendar::CalendarEntry;
use crate::domain::day::Day;
use crate::domain::message::Message;
use crate::domain::push::PushNotification;
use crate::domain::routine::RoutineDefinition;
use crate::domain::task::Task;
use crate::repos::{Store, StoreError};
use crate::timezone::local_day_bounds_utc;

const RECENT_MESSAGES_LIMIT: i64 = 50;
const RECENT_PUSH_NOTIFICATIONS_LIMIT: i64 = 20;

/// Everything a client needs to render one date's UI for one user (spec
/// §4.8's `sync_response.day_context`, glossary "DayContext").
#[derive(Debug, Serialize)]
pub struct DayContext {
    pub day: Option<Day>,
    pub tasks: Vec<Task>,
    pub calendar_entries: Vec<CalendarEntry>,
    pub messages: Vec<Message>,
    pub brain_dumps: Vec<BrainDumpItem>,
    pub routines: Vec<RoutineDefinition>,
    pub push_notifications: Vec<PushNotification>,
}

pub async fn day_context(store: &Store, user_id: Uuid, date: NaiveDate) -> Result<DayContext, StoreError> {
    let user = store.find_user(user_id).await?;
    let time_zone = user
        .map(|user| user.settings.time_zone)
        .unwrap_or_else(|| crate::timezone::DEFAULT_USER_TIME_ZONE.to_string());

    let day = store.find_day(user_id, date).await?;
    let tasks = store.list_tasks_for_date(user_id, date).await?;

    let calendar_entries = match local_day_bounds_utc(date, &time_zone) {
        Some((start, end)) => store.list_calendar_entries_starting_between(user_id, start, end).await?,
        None => Vec::new(),
    };

    let messages = store.list_messages(user_id, RECENT_MESSAGES_LIMIT).await?;
    let brain_dumps = store.list_pending_brain_dump_items(user_id, date).await?;
    let routines = store.list_routine_definitions(user_id).await?;
    let push_notifications = store
        .list_push_notifications(user_id, RECENT_PUSH_NOTIFICATIONS_LIMIT)
        .await?;

    Ok(DayContext {
        day,
        tasks,
        calendar_entries,
        messages,
        brain_dumps,
        routines,
        push_notifications,
    })
}
