use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::calendar::{CalendarAccount, CalendarEntry, CalendarEntrySeries};
use crate::event_dispatch::EventDispatcher;
use crate::gateways::{CalendarGateway, CalendarGatewayError, CalendarSyncRequest};
use crate::ids::calendar_entry_series_id;
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::uow::UnitOfWork;

use super::CommandError;

/// Re-exported for callers that build a `CalendarSyncRequest` themselves
/// (e.g. tests stubbing a `CalendarGateway`).
pub use crate::gateways::CalendarEntryUpstream;

const LOOKBACK: Duration = Duration::days(30);
const FAR_FUTURE_CUTOFF_DAYS: i64 = 365;

/// Runs one `SyncCalendar` pass for `(user_id, calendar_id)` (spec §4.4).
/// Authentication is delegated to the `CalendarGateway` implementation; a
/// `CalendarGatewayError::TokenExpired` maps to `CommandError::TokenExpired`
/// and stops before any writes.
pub async fn sync_calendar(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    platform: &str,
    calendar_id: &str,
    gateway: &dyn CalendarGateway,
) -> Result<(), CommandError> {
    let now = Utc::now();

    let mut account = match store.find_calendar_account(user_id, calendar_id).await? {
        Some(account) => account,
        None => CalendarAccount::create(
            Uuid::new_v4(),
            user_id,
            platform.to_string(),
            calendar_id.to_string(),
        ),
    };

    let request = CalendarSyncRequest {
        calendar_id: calendar_id.to_string(),
        lookback: LOOKBACK,
        sync_token: account.sync_token.clone(),
    };

    let result = gateway
        .load_calendar_events(request)
        .await
        .map_err(|error| match error {
            CalendarGatewayError::TokenExpired => CommandError::TokenExpired,
            CalendarGatewayError::ProviderFailure(message) => CommandError::Gateway(message),
        })?;

    let mut uow = UnitOfWork::begin(store.clone(), dispatcher, pubsub, user_id).await?;

    for upstream in &result.series_upserts {
        let series_id = calendar_entry_series_id(platform, &upstream.series_platform_id);
        match store.find_calendar_entry_series(series_id).await? {
            Some(mut series) => {
                if series.differs_from(
                    &upstream.name,
                    &upstream.frequency,
                    &upstream.category,
                    upstream.starts_at,
                    upstream.ends_at,
                ) {
                    series.apply_upstream_fields(
                        upstream.name.clone(),
                        upstream.frequency.clone(),
                        upstream.category.clone(),
                        upstream.starts_at,
                        upstream.ends_at,
                    );
                    cascade_series_fields(&store, &mut uow, series_id, &series).await?;
                    uow.add(&mut series);
                }
            }
            None => {
                let mut series = CalendarEntrySeries::create(
                    user_id,
                    platform.to_string(),
                    upstream.series_platform_id.clone(),
                    upstream.name.clone(),
                    upstream.frequency.clone(),
                    upstream.category.clone(),
                    upstream.starts_at,
                );
                uow.add(&mut series);
            }
        }
    }

    let far_future_cutoff = now + Duration::days(FAR_FUTURE_CUTOFF_DAYS);
    for upstream in &result.entry_upserts {
        if upstream.starts_at > far_future_cutoff {
            continue;
        }

        let series_id = upstream
            .series_platform_id
            .as_deref()
            .map(|series_platform_id| calendar_entry_series_id(platform, series_platform_id));

        match store
            .find_calendar_entry_by_platform_id(user_id, platform, &upstream.platform_id)
            .await?
        {
            Some(mut entry) => {
                if entry_differs(&entry, upstream) {
                    entry.apply_upstream_fields(
                        upstream.name.clone(),
                        upstream.starts_at,
                        upstream.ends_at,
                        upstream.attendance_status,
                    );
                    uow.add(&mut entry);
                }
            }
            None => {
                let mut entry = CalendarEntry::create(
                    Uuid::new_v4(),
                    user_id,
                    platform.to_string(),
                    upstream.platform_id.clone(),
                    series_id,
                    upstream.name.clone(),
                    upstream.frequency.clone(),
                    upstream.category.clone(),
                    upstream.starts_at,
                    upstream.ends_at,
                );
                uow.add(&mut entry);
            }
        }
    }

    for platform_id in &result.entry_deletes {
        let Some(mut entry) = store
            .find_calendar_entry_by_platform_id(user_id, platform, platform_id)
            .await?
        else {
            continue;
        };
        let series_id = entry.series_id;
        let entry_id = entry.id;
        entry.mark_deleted();
        uow.add(&mut entry);

        if let Some(series_id) = series_id {
            end_series_if_no_future_entries(&store, &mut uow, series_id, entry_id, now).await?;
        }
    }

    for series_platform_id in &result.series_deletes {
        let series_id = calendar_entry_series_id(platform, series_platform_id);
        store
            .delete_future_calendar_entries_in_tx(uow.connection(), series_id, now)
            .await?;
        store
            .end_calendar_entry_series_in_tx(uow.connection(), series_id, now)
            .await?;
    }

    account.record_sync(result.next_sync_token.clone(), now);
    uow.add(&mut account);

    uow.commit().await?;
    Ok(())
}

fn entry_differs(entry: &CalendarEntry, upstream: &CalendarEntryUpstream) -> bool {
    entry.name != upstream.name
        || entry.starts_at != upstream.starts_at
        || entry.ends_at != upstream.ends_at
        || entry.attendance_status != upstream.attendance_status
}

/// Series cascade rule (spec §4.4.1): every entry in the series gets the
/// series' current fields and exactly one `CalendarEntryUpdatedEvent`.
async fn cascade_series_fields(
    store: &Store,
    uow: &mut UnitOfWork<'_>,
    series_id: Uuid,
    series: &CalendarEntrySeries,
) -> Result<(), CommandError> {
    let entries = store.list_calendar_entries_for_series(series_id).await?;
    for mut entry in entries {
        entry.apply_series_fields(
            series.name.clone(),
            series.frequency.clone(),
            series.category.clone(),
        );
        uow.add(&mut entry);
    }
    Ok(())
}

async fn end_series_if_no_future_entries(
    store: &Store,
    uow: &mut UnitOfWork<'_>,
    series_id: Uuid,
    just_deleted_entry_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), CommandError> {
    let remaining = store.list_calendar_entries_for_series(series_id).await?;
    let has_future = remaining
        .iter()
        .any(|entry| entry.id != just_deleted_entry_id && entry.starts_at > now);
    if !has_future {
        store
            .end_calendar_entry_series_in_tx(uow.connection(), series_id, now)
            .await?;
    }
    Ok(())
}
