use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::llm_run_result::LlmRunResultSnapshot;
use crate::domain::push::{PushNotification, PushNotificationStatus, PushSubscription};

use super::{Store, StoreError};

impl Store {
    pub async fn upsert_push_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
               endpoint = EXCLUDED.endpoint,
               p256dh = EXCLUDED.p256dh,
               auth = EXCLUDED.auth,
               updated_at = NOW()",
        )
        .bind(subscription.id)
        .bind(subscription.user_id)
        .bind(&subscription.endpoint)
        .bind(&subscription.p256dh)
        .bind(&subscription.auth)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_push_subscriptions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PushSubscription>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, endpoint, p256dh, auth
             FROM push_subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PushSubscription::create(
                    row.try_get("id")?,
                    row.try_get("user_id")?,
                    row.try_get("endpoint")?,
                    row.try_get("p256dh")?,
                    row.try_get("auth")?,
                ))
            })
            .collect()
    }

    pub async fn delete_push_subscription(&self, subscription_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(subscription_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_push_notification(
        &self,
        notification: &PushNotification,
    ) -> Result<(), StoreError> {
        upsert_push_notification_via(&self.pool, notification).await
    }

    pub async fn upsert_push_notification_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        notification: &PushNotification,
    ) -> Result<(), StoreError> {
        upsert_push_notification_via(&mut *tx, notification).await
    }

    /// Most recent smart-notification send per user, used by the cooldown
    /// check in the smart-notification reactive loop (spec §4.5.3).
    pub async fn last_push_notification_sent_at(
        &self,
        user_id: Uuid,
        triggered_by: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let sent_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT sent_at FROM push_notifications
             WHERE user_id = $1 AND triggered_by = $2 AND status = 'success'
             ORDER BY sent_at DESC NULLS LAST
             LIMIT 1",
        )
        .bind(user_id)
        .bind(triggered_by)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        Ok(sent_at)
    }

    pub async fn list_push_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PushNotification>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, push_subscription_ids, content, status,
                    error_message, sent_at, triggered_by, llm_run_result
             FROM push_notifications
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(push_notification_from_row).collect()
    }
}

async fn upsert_push_notification_via<'e, E>(
    executor: E,
    notification: &PushNotification,
) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let llm_run_result = notification
        .llm_run_result
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    sqlx::query(
        "INSERT INTO push_notifications (
            id, user_id, push_subscription_ids, content, status,
            error_message, sent_at, triggered_by, llm_run_result
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status,
           error_message = EXCLUDED.error_message,
           sent_at = EXCLUDED.sent_at,
           llm_run_result = EXCLUDED.llm_run_result,
           updated_at = NOW()",
    )
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(&notification.push_subscription_ids)
    .bind(&notification.content)
    .bind(notification.status.as_str())
    .bind(&notification.error_message)
    .bind(notification.sent_at)
    .bind(&notification.triggered_by)
    .bind(llm_run_result)
    .execute(executor)
    .await?;

    Ok(())
}

fn push_notification_status_from_db(value: &str) -> Result<PushNotificationStatus, StoreError> {
    match value {
        "success" => Ok(PushNotificationStatus::Success),
        "skipped" => Ok(PushNotificationStatus::Skipped),
        "error" => Ok(PushNotificationStatus::Error),
        other => Err(StoreError::InvalidData(format!(
            "unknown push notification status persisted: {other}"
        ))),
    }
}

fn push_notification_from_row(row: &sqlx::postgres::PgRow) -> Result<PushNotification, StoreError> {
    let status: String = row.try_get("status")?;
    let status = push_notification_status_from_db(&status)?;

    let llm_run_result: Option<Value> = row.try_get("llm_run_result")?;
    let llm_run_result: Option<LlmRunResultSnapshot> = llm_run_result
        .map(serde_json::from_value)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;

    let mut notification = PushNotification::create(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("push_subscription_ids")?,
        row.try_get("content")?,
        status,
        row.try_get("error_message")?,
        row.try_get("sent_at")?,
        row.try_get("triggered_by")?,
    );
    notification.llm_run_result = llm_run_result;
    Ok(notification)
}
