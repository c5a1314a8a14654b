use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::day::{Alarm, Day, DayStatus};
use crate::domain::day_template::{DayTemplate, HighLevelPlan, TimeBlock};

use super::{Store, StoreError};

impl Store {
    pub async fn upsert_day(&self, day: &Day) -> Result<(), StoreError> {
        upsert_day_via(&self.pool, day).await
    }

    /// Same upsert, scoped to a caller-owned transaction — the path the
    /// UnitOfWork uses so the Day snapshot lands in the same commit as its
    /// audit row and deferred jobs.
    pub async fn upsert_day_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        day: &Day,
    ) -> Result<(), StoreError> {
        upsert_day_via(&mut *tx, day).await
    }

    pub async fn find_day(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<Day>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, date, status, template_id, time_blocks,
                    high_level_plan, alarms, tags, scheduled_at
             FROM days WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| day_from_row(&row)).transpose()
    }

    pub async fn find_day_by_id(&self, day_id: Uuid) -> Result<Option<Day>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, date, status, template_id, time_blocks,
                    high_level_plan, alarms, tags, scheduled_at
             FROM days WHERE id = $1",
        )
        .bind(day_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| day_from_row(&row)).transpose()
    }

    pub async fn list_days_in_range(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Day>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, date, status, template_id, time_blocks,
                    high_level_plan, alarms, tags, scheduled_at
             FROM days
             WHERE user_id = $1 AND date >= $2 AND date <= $3
             ORDER BY date ASC",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(day_from_row).collect()
    }

    /// Days with an unfired alarm due at or before `now`, across all users —
    /// the worker's fan-in query for the alarm-trigger reactive loop.
    pub async fn list_days_with_due_alarms(&self, now: DateTime<Utc>) -> Result<Vec<Day>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, date, status, template_id, time_blocks,
                    high_level_plan, alarms, tags, scheduled_at
             FROM days
             WHERE alarms <> '[]'::jsonb
               AND EXISTS (
                 SELECT 1 FROM jsonb_array_elements(alarms) AS alarm
                 WHERE (alarm->>'triggered_at') IS NULL
                   AND (alarm->>'datetime')::timestamptz <= $1
               )",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(day_from_row).collect()
    }

    pub async fn upsert_day_template(&self, template: &DayTemplate) -> Result<(), StoreError> {
        let time_blocks = serde_json::to_value(&template.time_blocks)
            .map_err(|error| StoreError::InvalidData(error.to_string()))?;
        let high_level_plan = serde_json::to_value(&template.high_level_plan)
            .map_err(|error| StoreError::InvalidData(error.to_string()))?;

        sqlx::query(
            "INSERT INTO day_templates (
                id, user_id, slug, start_time, end_time,
                routine_definition_ids, time_blocks, high_level_plan
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
               start_time = EXCLUDED.start_time,
               end_time = EXCLUDED.end_time,
               routine_definition_ids = EXCLUDED.routine_definition_ids,
               time_blocks = EXCLUDED.time_blocks,
               high_level_plan = EXCLUDED.high_level_plan,
               updated_at = NOW()",
        )
        .bind(template.id)
        .bind(template.user_id)
        .bind(&template.slug)
        .bind(template.start_time)
        .bind(template.end_time)
        .bind(&template.routine_definition_ids)
        .bind(time_blocks)
        .bind(high_level_plan)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_day_template(
        &self,
        user_id: Uuid,
        slug: &str,
    ) -> Result<Option<DayTemplate>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, slug, start_time, end_time,
                    routine_definition_ids, time_blocks, high_level_plan
             FROM day_templates WHERE user_id = $1 AND slug = $2",
        )
        .bind(user_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| day_template_from_row(&row)).transpose()
    }

    /// Looks a template up by id rather than slug — used when a Day already
    /// names a `template_id` and the scheduler re-resolves it without a
    /// caller-supplied slug (spec §4.3 step 2, second fallback).
    pub async fn find_day_template_by_id(
        &self,
        template_id: Uuid,
    ) -> Result<Option<DayTemplate>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, slug, start_time, end_time,
                    routine_definition_ids, time_blocks, high_level_plan
             FROM day_templates WHERE id = $1",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| day_template_from_row(&row)).transpose()
    }

    pub async fn list_day_templates(&self, user_id: Uuid) -> Result<Vec<DayTemplate>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, slug, start_time, end_time,
                    routine_definition_ids, time_blocks, high_level_plan
             FROM day_templates WHERE user_id = $1 ORDER BY slug ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(day_template_from_row).collect()
    }
}

fn day_template_from_row(row: &sqlx::postgres::PgRow) -> Result<DayTemplate, StoreError> {
    let time_blocks: Value = row.try_get("time_blocks")?;
    let time_blocks: Vec<TimeBlock> = serde_json::from_value(time_blocks)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let high_level_plan: Value = row.try_get("high_level_plan")?;
    let high_level_plan: HighLevelPlan = serde_json::from_value(high_level_plan)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    Ok(DayTemplate::from_persisted(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("slug")?,
        row.try_get("start_time")?,
        row.try_get("end_time")?,
        row.try_get("routine_definition_ids")?,
        time_blocks,
        high_level_plan,
    ))
}

async fn upsert_day_via<'e, E>(executor: E, day: &Day) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let time_blocks = serde_json::to_value(&day.time_blocks)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;
    let high_level_plan = serde_json::to_value(&day.high_level_plan)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;
    let alarms = serde_json::to_value(&day.alarms)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    sqlx::query(
        "INSERT INTO days (
            id, user_id, date, status, template_id, time_blocks,
            high_level_plan, alarms, tags, scheduled_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status,
           template_id = EXCLUDED.template_id,
           time_blocks = EXCLUDED.time_blocks,
           high_level_plan = EXCLUDED.high_level_plan,
           alarms = EXCLUDED.alarms,
           tags = EXCLUDED.tags,
           scheduled_at = EXCLUDED.scheduled_at,
           updated_at = NOW()",
    )
    .bind(day.id)
    .bind(day.user_id)
    .bind(day.date)
    .bind(day.status.as_str())
    .bind(day.template_id)
    .bind(time_blocks)
    .bind(high_level_plan)
    .bind(alarms)
    .bind(&day.tags)
    .bind(day.scheduled_at)
    .execute(executor)
    .await?;

    Ok(())
}

fn day_from_row(row: &sqlx::postgres::PgRow) -> Result<Day, StoreError> {
    let status: String = row.try_get("status")?;
    let status = DayStatus::from_str(&status)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown day status persisted: {status}")))?;

    let time_blocks: Value = row.try_get("time_blocks")?;
    let time_blocks: Vec<TimeBlock> = serde_json::from_value(time_blocks)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let high_level_plan: Value = row.try_get("high_level_plan")?;
    let high_level_plan: HighLevelPlan = serde_json::from_value(high_level_plan)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let alarms: Value = row.try_get("alarms")?;
    let alarms: Vec<Alarm> =
        serde_json::from_value(alarms).map_err(|error| StoreError::InvalidData(error.to_string()))?;

    Ok(Day::from_persisted(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("date")?,
        status,
        row.try_get("template_id")?,
        time_blocks,
        high_level_plan,
        alarms,
        row.try_get("tags")?,
        row.try_get("scheduled_at")?,
    ))
}
