use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::EntityKind;
use crate::domain::audit_log::AuditLog;

use super::{Store, StoreError};

#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub entity_type: Option<EntityKind>,
    pub since: Option<DateTime<Utc>>,
    pub cursor: Option<(DateTime<Utc>, Uuid)>,
    pub limit: i64,
}

impl Store {
    /// Synthesized directly from a stamped `DomainEvent` by the UnitOfWork
    /// at commit time — never constructed from an `Aggregate`.
    pub async fn insert_audit_log_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        user_id: Uuid,
        activity_type: &str,
        entity_id: Uuid,
        entity_type: EntityKind,
        occurred_at: DateTime<Utc>,
        entity_data: Option<&Value>,
    ) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO audit_logs
               (user_id, activity_type, entity_id, entity_type, occurred_at, entity_data)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(user_id)
        .bind(activity_type)
        .bind(entity_id)
        .bind(entity_type.as_str())
        .bind(occurred_at)
        .bind(entity_data)
        .fetch_one(tx)
        .await?;

        Ok(id)
    }

    pub async fn list_audit_logs(
        &self,
        user_id: Uuid,
        filter: &AuditLogFilter,
    ) -> Result<Vec<AuditLog>, StoreError> {
        let limit = if filter.limit <= 0 { 100 } else { filter.limit };

        let rows = sqlx::query(
            "SELECT id, user_id, activity_type, entity_id, entity_type, occurred_at, entity_data
             FROM audit_logs
             WHERE user_id = $1
               AND ($2::text IS NULL OR entity_type = $2)
               AND ($3::timestamptz IS NULL OR occurred_at >= $3)
               AND (
                 $4::timestamptz IS NULL
                 OR occurred_at < $4
                 OR (occurred_at = $4 AND id < $5)
               )
             ORDER BY occurred_at DESC, id DESC
             LIMIT $6",
        )
        .bind(user_id)
        .bind(filter.entity_type.map(EntityKind::as_str))
        .bind(filter.since)
        .bind(filter.cursor.map(|(ts, _)| ts))
        .bind(filter.cursor.map(|(_, id)| id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(audit_log_from_row).collect()
    }

    /// Audit rows for a single date, per `is_audit_log_for_today`'s
    /// whole-user-entity exception: `RoutineDefinition`/`DayTemplate` rows are
    /// always candidates regardless of `since`, so the WHERE clause only
    /// narrows by user and ordering is left to the caller's date filter.
    pub async fn list_audit_logs_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<AuditLog>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, activity_type, entity_id, entity_type, occurred_at, entity_data
             FROM audit_logs
             WHERE user_id = $1 AND occurred_at >= $2
             ORDER BY occurred_at ASC, id ASC",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(audit_log_from_row).collect()
    }
}

fn audit_log_from_row(row: sqlx::postgres::PgRow) -> Result<AuditLog, StoreError> {
    let entity_type: String = row.try_get("entity_type")?;
    let entity_type = entity_kind_from_db(&entity_type)?;

    Ok(AuditLog {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        activity_type: row.try_get("activity_type")?,
        entity_id: row.try_get("entity_id")?,
        entity_type,
        occurred_at: row.try_get("occurred_at")?,
        entity_data: row.try_get("entity_data")?,
    })
}

fn entity_kind_from_db(value: &str) -> Result<EntityKind, StoreError> {
    match value {
        "User" => Ok(EntityKind::User),
        "DayTemplate" => Ok(EntityKind::DayTemplate),
        "Day" => Ok(EntityKind::Day),
        "Task" => Ok(EntityKind::Task),
        "RoutineDefinition" => Ok(EntityKind::RoutineDefinition),
        "CalendarEntry" => Ok(EntityKind::CalendarEntry),
        "CalendarEntrySeries" => Ok(EntityKind::CalendarEntrySeries),
        "Message" => Ok(EntityKind::Message),
        "PushSubscription" => Ok(EntityKind::PushSubscription),
        "PushNotification" => Ok(EntityKind::PushNotification),
        "BrainDumpItem" => Ok(EntityKind::BrainDumpItem),
        _ => Err(StoreError::InvalidData(format!(
            "unknown entity type persisted: {value}"
        ))),
    }
}
