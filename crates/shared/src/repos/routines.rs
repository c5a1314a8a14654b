use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::routine::{RecurrenceSchedule, RoutineDefinition, RoutineTaskTemplate};

use super::{Store, StoreError};

impl Store {
    pub async fn upsert_routine_definition(
        &self,
        routine: &RoutineDefinition,
    ) -> Result<(), StoreError> {
        let recurrence = serde_json::to_value(&routine.recurrence)
            .map_err(|error| StoreError::InvalidData(error.to_string()))?;
        let routine_tasks = serde_json::to_value(&routine.routine_tasks)
            .map_err(|error| StoreError::InvalidData(error.to_string()))?;

        sqlx::query(
            "INSERT INTO routine_definitions (id, user_id, name, recurrence, routine_tasks)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
               name = EXCLUDED.name,
               recurrence = EXCLUDED.recurrence,
               routine_tasks = EXCLUDED.routine_tasks,
               updated_at = NOW()",
        )
        .bind(routine.id)
        .bind(routine.user_id)
        .bind(&routine.name)
        .bind(recurrence)
        .bind(routine_tasks)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_routine_definition(
        &self,
        routine_id: Uuid,
    ) -> Result<Option<RoutineDefinition>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, recurrence, routine_tasks
             FROM routine_definitions WHERE id = $1",
        )
        .bind(routine_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| routine_from_row(&row)).transpose()
    }

    pub async fn list_routine_definitions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RoutineDefinition>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, recurrence, routine_tasks
             FROM routine_definitions WHERE user_id = $1 ORDER BY name ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(routine_from_row).collect()
    }
}

fn routine_from_row(row: &sqlx::postgres::PgRow) -> Result<RoutineDefinition, StoreError> {
    let recurrence: Value = row.try_get("recurrence")?;
    let recurrence: RecurrenceSchedule = serde_json::from_value(recurrence)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let routine_tasks: Value = row.try_get("routine_tasks")?;
    let routine_tasks: Vec<RoutineTaskTemplate> = serde_json::from_value(routine_tasks)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    Ok(RoutineDefinition::from_persisted(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("name")?,
        recurrence,
        routine_tasks,
    ))
}
