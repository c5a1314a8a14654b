use chrono::NaiveDate;
use uuid::Uuid;

use crate::commands::CommandError;
use crate::commands::schedule_day::{materialize_routine_tasks, resolve_template};
use crate::domain::day::Day;
use crate::domain::task::Task;
use crate::repos::{Store, StoreError};

#[derive(Debug)]
pub enum PreviewDayError {
    Store(StoreError),
    NoTemplate,
}

impl From<StoreError> for PreviewDayError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl From<CommandError> for PreviewDayError {
    fn from(error: CommandError) -> Self {
        match error {
            CommandError::Internal(store_error) => Self::Store(store_error),
            _ => Self::NoTemplate,
        }
    }
}

/// Read-only counterpart to `commands::schedule_day` (glossary "preview
/// day", §2's Query Handlers row): runs the same template-resolution and
/// routine-materialization logic but never opens a UoW or persists
/// anything, sharing `materialize_routine_tasks` so the two can't drift.
pub async fn preview_day(
    store: &Store,
    user_id: Uuid,
    date: NaiveDate,
    template_slug: Option<String>,
) -> Result<(Day, Vec<Task>), PreviewDayError> {
    let existing_day = store.find_day(user_id, date).await?;

    let template = resolve_template(store, user_id, date, template_slug, existing_day.as_ref())
        .await?
        .ok_or(PreviewDayError::NoTemplate)?;

    let mut day = existing_day.unwrap_or_else(|| Day::new_unscheduled(user_id, date));
    day.schedule(&template, chrono::Utc::now());
    day.drain_events();

    let routines = store.list_routine_definitions(user_id).await?;
    let tasks = materialize_routine_tasks(&routines, user_id, date);

    Ok((day, tasks))
}
