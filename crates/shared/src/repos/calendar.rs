use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::calendar::{AttendanceStatus, CalendarAccount, CalendarEntry, CalendarEntrySeries};
use crate::domain::task::{TaskCategory, TaskFrequency};

use super::{Store, StoreError};

impl Store {
    pub async fn upsert_calendar_entry_series(
        &self,
        series: &CalendarEntrySeries,
    ) -> Result<(), StoreError> {
        upsert_calendar_entry_series_via(&self.pool, series).await
    }

    pub async fn upsert_calendar_entry_series_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        series: &CalendarEntrySeries,
    ) -> Result<(), StoreError> {
        upsert_calendar_entry_series_via(&mut *tx, series).await
    }

    /// Sets `ends_at = now` without touching any other field — used when a
    /// series loses its last future occurrence (spec §4.4 step 5) or is
    /// deleted outright (step 6).
    pub async fn end_calendar_entry_series_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        series_id: Uuid,
        ends_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE calendar_entry_series SET ends_at = $2, updated_at = NOW() WHERE id = $1")
            .bind(series_id)
            .bind(ends_at)
            .execute(tx)
            .await?;

        Ok(())
    }

    /// Deletes all future entries in a series ahead of a `series_delete`
    /// (spec §4.4 step 6).
    pub async fn delete_future_calendar_entries_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        series_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE calendar_entries SET deleted = TRUE, updated_at = NOW() WHERE series_id = $1 AND starts_at > $2")
            .bind(series_id)
            .bind(after)
            .execute(tx)
            .await?;

        Ok(())
    }

    pub async fn find_calendar_entry_series(
        &self,
        series_id: Uuid,
    ) -> Result<Option<CalendarEntrySeries>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, platform, series_platform_id, name,
                    frequency, category, starts_at, ends_at
             FROM calendar_entry_series WHERE id = $1",
        )
        .bind(series_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| calendar_entry_series_from_row(&row)).transpose()
    }

    pub async fn upsert_calendar_entry(&self, entry: &CalendarEntry) -> Result<(), StoreError> {
        upsert_calendar_entry_via(&self.pool, entry).await
    }

    pub async fn upsert_calendar_entry_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        entry: &CalendarEntry,
    ) -> Result<(), StoreError> {
        upsert_calendar_entry_via(&mut *tx, entry).await
    }

    pub async fn find_calendar_entry_by_platform_id(
        &self,
        user_id: Uuid,
        platform: &str,
        platform_id: &str,
    ) -> Result<Option<CalendarEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, platform, platform_id, series_id, name,
                    frequency, category, starts_at, ends_at, attendance_status, deleted
             FROM calendar_entries
             WHERE user_id = $1 AND platform = $2 AND platform_id = $3",
        )
        .bind(user_id)
        .bind(platform)
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| calendar_entry_from_row(&row)).transpose()
    }

    pub async fn list_calendar_entries_for_series(
        &self,
        series_id: Uuid,
    ) -> Result<Vec<CalendarEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, platform, platform_id, series_id, name,
                    frequency, category, starts_at, ends_at, attendance_status, deleted
             FROM calendar_entries
             WHERE series_id = $1 AND deleted = FALSE
             ORDER BY starts_at ASC",
        )
        .bind(series_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(calendar_entry_from_row).collect()
    }

    /// Upcoming entries within the reminder lookahead window (spec §4.5.2).
    pub async fn list_calendar_entries_starting_between(
        &self,
        user_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, platform, platform_id, series_id, name,
                    frequency, category, starts_at, ends_at, attendance_status, deleted
             FROM calendar_entries
             WHERE user_id = $1
               AND deleted = FALSE
               AND starts_at >= $2
               AND starts_at <= $3
             ORDER BY starts_at ASC",
        )
        .bind(user_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(calendar_entry_from_row).collect()
    }

    pub async fn upsert_calendar_account_in_tx(
        &self,
        tx: &mut sqlx::PgConnection,
        account: &CalendarAccount,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO calendar_accounts (
                id, user_id, platform, calendar_id, sync_token, last_sync_at
             ) VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET
               sync_token = EXCLUDED.sync_token,
               last_sync_at = EXCLUDED.last_sync_at,
               updated_at = NOW()",
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.platform)
        .bind(&account.calendar_id)
        .bind(&account.sync_token)
        .bind(account.last_sync_at)
        .execute(tx)
        .await?;

        Ok(())
    }

    pub async fn find_calendar_account(
        &self,
        user_id: Uuid,
        calendar_id: &str,
    ) -> Result<Option<CalendarAccount>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, platform, calendar_id, sync_token, last_sync_at
             FROM calendar_accounts WHERE user_id = $1 AND calendar_id = $2",
        )
        .bind(user_id)
        .bind(calendar_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| calendar_account_from_row(&row)).transpose()
    }

    pub async fn list_calendar_accounts(&self, user_id: Uuid) -> Result<Vec<CalendarAccount>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, platform, calendar_id, sync_token, last_sync_at
             FROM calendar_accounts WHERE user_id = $1 ORDER BY calendar_id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(calendar_account_from_row).collect()
    }
}

fn calendar_account_from_row(row: &sqlx::postgres::PgRow) -> Result<CalendarAccount, StoreError> {
    Ok(CalendarAccount::from_persisted(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("platform")?,
        row.try_get("calendar_id")?,
        row.try_get("sync_token")?,
        row.try_get("last_sync_at")?,
    ))
}

async fn upsert_calendar_entry_series_via<'e, E>(
    executor: E,
    series: &CalendarEntrySeries,
) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO calendar_entry_series (
            id, user_id, platform, series_platform_id, name,
            frequency, category, starts_at, ends_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
           name = EXCLUDED.name,
           frequency = EXCLUDED.frequency,
           category = EXCLUDED.category,
           starts_at = EXCLUDED.starts_at,
           ends_at = EXCLUDED.ends_at,
           updated_at = NOW()",
    )
    .bind(series.id)
    .bind(series.user_id)
    .bind(&series.platform)
    .bind(&series.series_platform_id)
    .bind(&series.name)
    .bind(series.frequency.as_str())
    .bind(series.category.as_str())
    .bind(series.starts_at)
    .bind(series.ends_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn upsert_calendar_entry_via<'e, E>(executor: E, entry: &CalendarEntry) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO calendar_entries (
            id, user_id, platform, platform_id, series_id, name,
            frequency, category, starts_at, ends_at, attendance_status, deleted
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (id) DO UPDATE SET
           name = EXCLUDED.name,
           frequency = EXCLUDED.frequency,
           category = EXCLUDED.category,
           starts_at = EXCLUDED.starts_at,
           ends_at = EXCLUDED.ends_at,
           attendance_status = EXCLUDED.attendance_status,
           deleted = EXCLUDED.deleted,
           updated_at = NOW()",
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(&entry.platform)
    .bind(&entry.platform_id)
    .bind(entry.series_id)
    .bind(&entry.name)
    .bind(entry.frequency.as_str())
    .bind(entry.category.as_str())
    .bind(entry.starts_at)
    .bind(entry.ends_at)
    .bind(entry.attendance_status.as_str())
    .bind(entry.deleted)
    .execute(executor)
    .await?;

    Ok(())
}

fn calendar_entry_series_from_row(
    row: &sqlx::postgres::PgRow,
) -> Result<CalendarEntrySeries, StoreError> {
    let frequency: String = row.try_get("frequency")?;
    let category: String = row.try_get("category")?;

    Ok(CalendarEntrySeries::from_persisted(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("platform")?,
        row.try_get("series_platform_id")?,
        row.try_get("name")?,
        TaskFrequency::from_str(&frequency),
        TaskCategory::from_str(&category),
        row.try_get("starts_at")?,
        row.try_get("ends_at")?,
    ))
}

fn calendar_entry_from_row(row: &sqlx::postgres::PgRow) -> Result<CalendarEntry, StoreError> {
    let frequency: String = row.try_get("frequency")?;
    let category: String = row.try_get("category")?;
    let attendance_status: String = row.try_get("attendance_status")?;

    Ok(CalendarEntry::from_persisted(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("platform")?,
        row.try_get("platform_id")?,
        row.try_get("series_id")?,
        row.try_get("name")?,
        TaskFrequency::from_str(&frequency),
        TaskCategory::from_str(&category),
        row.try_get("starts_at")?,
        row.try_get("ends_at")?,
        AttendanceStatus::from_str(&attendance_status),
        row.try_get("deleted")?,
    ))
}
