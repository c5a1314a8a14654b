use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::day::Day;
use crate::domain::day_template::DayTemplate;
use crate::domain::task::Task;
use crate::event_dispatch::EventDispatcher;
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::timezone::weekday_index;
use crate::uow::UnitOfWork;

use super::CommandError;

/// Materializes a Day from a Day Template and the user's active Routines
/// for `date`, idempotently replacing prior routine-sourced tasks (spec
/// §4.3). Adhoc tasks for the date are left untouched.
pub async fn schedule_day(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    date: NaiveDate,
    template_slug: Option<String>,
) -> Result<Day, CommandError> {
    let mut uow = UnitOfWork::begin(store.clone(), dispatcher, pubsub, user_id).await?;

    let existing_day = store.find_day(user_id, date).await?;
    let template = resolve_template(&store, user_id, date, template_slug, existing_day.as_ref())
        .await?
        .ok_or_else(|| CommandError::Validation("Day template is required to schedule".to_string()))?;

    store
        .delete_routine_sourced_tasks_for_date_in_tx(uow.connection(), user_id, date)
        .await?;

    let mut day = existing_day.unwrap_or_else(|| Day::new_unscheduled(user_id, date));
    day.schedule(&template, Utc::now());

    let routines = store.list_routine_definitions(user_id).await?;
    let mut tasks = materialize_routine_tasks(&routines, user_id, date);

    uow.add(&mut day);
    for task in &mut tasks {
        uow.add(task);
    }

    uow.commit().await?;
    Ok(day)
}

/// Shared with `queries::preview_day` so the two can never drift (spec
/// §8.2's idempotence property covers both): one Task per `routine_task`
/// of every routine whose `RecurrenceSchedule` matches `date`.
pub(crate) fn materialize_routine_tasks(
    routines: &[crate::domain::routine::RoutineDefinition],
    user_id: Uuid,
    date: NaiveDate,
) -> Vec<Task> {
    let mut tasks = Vec::new();
    for routine in routines.iter().filter(|routine| routine.is_active_on(date)) {
        for routine_task in &routine.routine_tasks {
            tasks.push(Task::create(
                Uuid::new_v4(),
                user_id,
                date,
                routine_task.name.clone(),
                routine_task.category.clone(),
                routine_task.task_type.clone(),
                routine_task.frequency.clone(),
                routine_task.schedule.clone(),
                Some(routine.id),
                routine_task.tags.clone(),
            ));
        }
    }
    tasks
}

pub(crate) async fn resolve_template(
    store: &Store,
    user_id: Uuid,
    date: NaiveDate,
    template_slug: Option<String>,
    existing_day: Option<&Day>,
) -> Result<Option<DayTemplate>, CommandError> {
    if let Some(slug) = template_slug.as_deref() {
        if let Some(template) = store.find_day_template(user_id, slug).await? {
            return Ok(Some(template));
        }
    }

    if let Some(template_id) = existing_day.and_then(|day| day.template_id) {
        if let Some(template) = store.find_day_template_by_id(template_id).await? {
            return Ok(Some(template));
        }
    }

    let user = store.find_user(user_id).await?.ok_or(CommandError::NotFound)?;
    if let Some(slug) = user.settings.template_defaults[weekday_index(date)].as_deref() {
        return Ok(store.find_day_template(user_id, slug).await?);
    }

    Ok(None)
}
