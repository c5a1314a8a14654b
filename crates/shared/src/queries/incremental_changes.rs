use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::audit_log::ChangeType;
use crate::repos::{Store, StoreError};

#[derive(Debug, Serialize)]
pub struct Change {
    pub change_type: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub entity_data: Option<Value>,
}

/// The non-null branch of `sync_request{since_timestamp}` (spec §4.8 step
/// 3): audit log rows strictly after `since`, filtered by
/// `is_audit_log_for_today` (spec §4.8.1) and ordered by `occurred_at`.
pub async fn incremental_changes(
    store: &Store,
    user_id: Uuid,
    since: DateTime<Utc>,
    target_date: NaiveDate,
) -> Result<Vec<Change>, StoreError> {
    let logs = store.list_audit_logs_since(user_id, since).await?;

    let mut changes = Vec::new();
    for log in logs {
        if log.occurred_at <= since || !log.is_for_date(target_date) {
            continue;
        }
        let Some(change_type) = log.change_type() else {
            continue;
        };

        let entity_data = if change_type == ChangeType::Deleted {
            None
        } else {
            log.entity_data
        };

        changes.push(Change {
            change_type: change_type.as_str(),
            entity_type: log.entity_type.as_str(),
            entity_id: log.entity_id,
            entity_data,
        });
    }

    Ok(changes)
}
