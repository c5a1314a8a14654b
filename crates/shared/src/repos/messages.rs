use std::collections::HashMap;

use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::llm_run_result::LlmRunResultSnapshot;
use crate::domain::message::{Message, MessageRole};

use super::{Store, StoreError};

impl Store {
    pub async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        upsert_message_via(&self.pool, message).await
    }

    pub async fn upsert_message_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        message: &Message,
    ) -> Result<(), StoreError> {
        upsert_message_via(&mut *tx, message).await
    }

    pub async fn list_messages(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, role, content, meta, triggered_by, llm_run_result
             FROM messages
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    pub async fn find_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, role, content, meta, triggered_by, llm_run_result
             FROM messages
             WHERE id = $1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    pub async fn find_message_thread_by_phone_number(
        &self,
        from_number: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM messages WHERE meta->>'from_number' = $1 LIMIT 1",
        )
        .bind(from_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }
}

async fn upsert_message_via<'e, E>(executor: E, message: &Message) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let meta = serde_json::to_value(&message.meta)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;
    let llm_run_result = message
        .llm_run_result
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    sqlx::query(
        "INSERT INTO messages (id, user_id, role, content, meta, triggered_by, llm_run_result)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET
           llm_run_result = EXCLUDED.llm_run_result,
           updated_at = NOW()",
    )
    .bind(message.id)
    .bind(message.user_id)
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(meta)
    .bind(&message.triggered_by)
    .bind(llm_run_result)
    .execute(executor)
    .await?;

    Ok(())
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> Result<Message, StoreError> {
    let role: String = row.try_get("role")?;
    let role = match role.as_str() {
        "USER" => MessageRole::User,
        "ASSISTANT" => MessageRole::Assistant,
        "SYSTEM" => MessageRole::System,
        other => {
            return Err(StoreError::InvalidData(format!(
                "unknown message role persisted: {other}"
            )));
        }
    };

    let meta: Value = row.try_get("meta")?;
    let meta: HashMap<String, Value> =
        serde_json::from_value(meta).map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let llm_run_result: Option<Value> = row.try_get("llm_run_result")?;
    let llm_run_result: Option<LlmRunResultSnapshot> = llm_run_result
        .map(serde_json::from_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let mut message = Message::create(
        row.try_get("id")?,
        row.try_get("user_id")?,
        role,
        row.try_get("content")?,
        meta,
        row.try_get("triggered_by")?,
    );
    message.llm_run_result = llm_run_result;
    Ok(message)
}
