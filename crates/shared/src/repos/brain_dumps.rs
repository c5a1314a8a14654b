use chrono::NaiveDate;
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::brain_dump::{BrainDumpItem, BrainDumpStatus};
use crate::domain::llm_run_result::LlmRunResultSnapshot;

use super::{Store, StoreError};

impl Store {
    pub async fn insert_brain_dump_item(&self, item: &BrainDumpItem) -> Result<(), StoreError> {
        insert_brain_dump_item_via(&self.pool, item).await
    }

    pub async fn update_brain_dump_item(&self, item: &BrainDumpItem) -> Result<(), StoreError> {
        update_brain_dump_item_via(&self.pool, item).await
    }

    /// Upserts a `BrainDumpItem` inside a transaction, used both for the
    /// initial `INSERT` (when a message ingests a brain-dump line) and for
    /// the `ProcessBrainDumpItem` handler's status transition — the UoW's
    /// `Aggregate::upsert_in_tx` wiring treats both as the same operation.
    pub async fn upsert_brain_dump_item_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        item: &BrainDumpItem,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO brain_dump_items (
                id, user_id, day_date, raw_text, status, resulting_task_id, llm_run_result
             ) VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET
               status = EXCLUDED.status,
               resulting_task_id = EXCLUDED.resulting_task_id,
               llm_run_result = EXCLUDED.llm_run_result,
               updated_at = NOW()",
        )
        .bind(item.id)
        .bind(item.user_id)
        .bind(item.day_date)
        .bind(&item.raw_text)
        .bind(item.status.as_str())
        .bind(item.resulting_task_id)
        .bind(
            item.llm_run_result
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|error| StoreError::InvalidData(error.to_string()))?,
        )
        .execute(tx)
        .await?;

        Ok(())
    }

    pub async fn find_brain_dump_item(&self, item_id: Uuid) -> Result<Option<BrainDumpItem>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, day_date, raw_text, status, resulting_task_id, llm_run_result
             FROM brain_dump_items WHERE id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| brain_dump_item_from_row(&row)).transpose()
    }

    pub async fn list_pending_brain_dump_items(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BrainDumpItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, day_date, raw_text, status, resulting_task_id, llm_run_result
             FROM brain_dump_items
             WHERE user_id = $1 AND day_date = $2 AND status = 'PENDING'
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(brain_dump_item_from_row).collect()
    }
}

async fn insert_brain_dump_item_via<'e, E>(executor: E, item: &BrainDumpItem) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO brain_dump_items (id, user_id, day_date, raw_text, status)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(item.id)
    .bind(item.user_id)
    .bind(item.day_date)
    .bind(&item.raw_text)
    .bind(item.status.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

async fn update_brain_dump_item_via<'e, E>(executor: E, item: &BrainDumpItem) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let llm_run_result = item
        .llm_run_result
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    sqlx::query(
        "UPDATE brain_dump_items
         SET status = $2, resulting_task_id = $3, llm_run_result = $4, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(item.id)
    .bind(item.status.as_str())
    .bind(item.resulting_task_id)
    .bind(llm_run_result)
    .execute(executor)
    .await?;

    Ok(())
}

fn brain_dump_item_from_row(row: &sqlx::postgres::PgRow) -> Result<BrainDumpItem, StoreError> {
    let status: String = row.try_get("status")?;
    let status = match status.as_str() {
        "PENDING" => BrainDumpStatus::Pending,
        "PROCESSED" => BrainDumpStatus::Processed,
        "DISCARDED" => BrainDumpStatus::Discarded,
        other => {
            return Err(StoreError::InvalidData(format!(
                "unknown brain dump status persisted: {other}"
            )));
        }
    };

    let llm_run_result: Option<Value> = row.try_get("llm_run_result")?;
    let llm_run_result: Option<LlmRunResultSnapshot> = llm_run_result
        .map(serde_json::from_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let mut item = BrainDumpItem::create(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("day_date")?,
        row.try_get("raw_text")?,
    );
    item.status = status;
    item.resulting_task_id = row.try_get("resulting_task_id")?;
    item.llm_run_result = llm_run_result;
    Ok(item)
}
