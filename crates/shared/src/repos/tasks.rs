use chrono::NaiveDate;
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::llm_run_result::LlmRunResultSnapshot;
use crate::domain::task::{Task, TaskAction, TaskCategory, TaskFrequency, TaskStatus, TimeWindow};

use super::{Store, StoreError};

impl Store {
    pub async fn upsert_task(&self, task: &Task) -> Result<(), StoreError> {
        upsert_task_via(&self.pool, task).await
    }

    pub async fn upsert_task_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        task: &Task,
    ) -> Result<(), StoreError> {
        upsert_task_via(&mut *tx, task).await
    }

    /// Deletes routine-sourced tasks for a date ahead of rematerializing them
    /// (spec §4.3 step 3); adhoc tasks (`routine_definition_id IS NULL`) are
    /// untouched.
    pub async fn delete_routine_sourced_tasks_for_date_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM tasks
             WHERE user_id = $1 AND scheduled_date = $2 AND routine_definition_id IS NOT NULL",
        )
        .bind(user_id)
        .bind(date)
        .execute(tx)
        .await?;

        Ok(())
    }

    pub async fn find_task(&self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, scheduled_date, name, status, category, task_type,
                    frequency, schedule, routine_definition_id, tags, actions,
                    completed_at, llm_run_result
             FROM tasks WHERE id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| task_from_row(&row)).transpose()
    }

    pub async fn list_tasks_for_date(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, scheduled_date, name, status, category, task_type,
                    frequency, schedule, routine_definition_id, tags, actions,
                    completed_at, llm_run_result
             FROM tasks WHERE user_id = $1 AND scheduled_date = $2
             ORDER BY id ASC",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(task_from_row).collect()
    }

    /// Incomplete, non-daily tasks over the risk-scoring lookback window
    /// (spec §4.5.5) — fed to `queries::task_risk` for weighting.
    pub async fn list_risk_candidate_tasks(
        &self,
        user_id: Uuid,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, scheduled_date, name, status, category, task_type,
                    frequency, schedule, routine_definition_id, tags, actions,
                    completed_at, llm_run_result
             FROM tasks
             WHERE user_id = $1
               AND scheduled_date >= $2
               AND scheduled_date <= $3
               AND status NOT IN ('COMPLETE')
               AND frequency <> 'DAILY'
             ORDER BY scheduled_date ASC",
        )
        .bind(user_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(task_from_row).collect()
    }
}

async fn upsert_task_via<'e, E>(executor: E, task: &Task) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let schedule = task
        .schedule
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;
    let actions = serde_json::to_value(&task.actions)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;
    let llm_run_result = task
        .llm_run_result
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    sqlx::query(
        "INSERT INTO tasks (
            id, user_id, scheduled_date, name, status, category, task_type,
            frequency, schedule, routine_definition_id, tags, actions,
            completed_at, llm_run_result
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         ON CONFLICT (id) DO UPDATE SET
           name = EXCLUDED.name,
           status = EXCLUDED.status,
           category = EXCLUDED.category,
           task_type = EXCLUDED.task_type,
           frequency = EXCLUDED.frequency,
           schedule = EXCLUDED.schedule,
           routine_definition_id = EXCLUDED.routine_definition_id,
           tags = EXCLUDED.tags,
           actions = EXCLUDED.actions,
           completed_at = EXCLUDED.completed_at,
           llm_run_result = EXCLUDED.llm_run_result,
           updated_at = NOW()",
    )
    .bind(task.id)
    .bind(task.user_id)
    .bind(task.scheduled_date)
    .bind(&task.name)
    .bind(task.status.as_str())
    .bind(task.category.as_str())
    .bind(&task.task_type)
    .bind(task.frequency.as_str())
    .bind(schedule)
    .bind(task.routine_definition_id)
    .bind(&task.tags)
    .bind(actions)
    .bind(task.completed_at)
    .bind(llm_run_result)
    .execute(executor)
    .await?;

    Ok(())
}

fn task_from_row(row: &sqlx::postgres::PgRow) -> Result<Task, StoreError> {
    let status: String = row.try_get("status")?;
    let status = TaskStatus::from_str(&status)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown task status persisted: {status}")))?;

    let category: String = row.try_get("category")?;
    let category = TaskCategory::from_str(&category);

    let frequency: String = row.try_get("frequency")?;
    let frequency = TaskFrequency::from_str(&frequency);

    let schedule: Option<Value> = row.try_get("schedule")?;
    let schedule: Option<TimeWindow> = schedule
        .map(serde_json::from_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let actions: Value = row.try_get("actions")?;
    let actions: Vec<TaskAction> = serde_json::from_value(actions)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let llm_run_result: Option<Value> = row.try_get("llm_run_result")?;
    let llm_run_result: Option<LlmRunResultSnapshot> = llm_run_result
        .map(serde_json::from_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    Ok(Task::from_persisted(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("scheduled_date")?,
        row.try_get("name")?,
        status,
        category,
        row.try_get("task_type")?,
        frequency,
        schedule,
        row.try_get("routine_definition_id")?,
        row.try_get("tags")?,
        actions,
        row.try_get("completed_at")?,
        llm_run_result,
    ))
}
