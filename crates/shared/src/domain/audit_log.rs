use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::EntityKind;

/// A row in the append-only per-user audit stream (spec §3.1, §3.2). Unlike
/// the other domain types this is never passed to `uow.add` — the UoW
/// synthesizes it directly from a [`super::DomainEvent`] at commit time
/// (spec §4.1 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: String,
    pub entity_id: Uuid,
    pub entity_type: EntityKind,
    pub occurred_at: DateTime<Utc>,
    pub entity_data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl AuditLog {
    /// Change-type derivation from `activity_type` (spec §4.8.1). Events
    /// whose activity type matches none of these patterns are skipped by
    /// the WebSocket sync layer entirely.
    pub fn change_type(&self) -> Option<ChangeType> {
        derive_change_type(&self.activity_type)
    }

    /// The `is_audit_log_for_today` predicate (spec §4.8.1): whole-user
    /// entity kinds (routines, templates) are always included; everything
    /// else is matched against the date field its `entity_data` snapshot
    /// carries.
    pub fn is_for_date(&self, target_date: NaiveDate) -> bool {
        match self.entity_type {
            EntityKind::RoutineDefinition | EntityKind::DayTemplate => true,
            _ => self
                .entity_data
                .as_ref()
                .is_some_and(|data| entity_data_matches_date(self.entity_type, data, target_date)),
        }
    }
}

pub fn derive_change_type(activity_type: &str) -> Option<ChangeType> {
    if activity_type.contains("Created") || activity_type == "EntityCreatedEvent" {
        Some(ChangeType::Created)
    } else if activity_type.contains("Deleted") || activity_type == "EntityDeletedEvent" {
        Some(ChangeType::Deleted)
    } else if activity_type.contains("Updated")
        || activity_type == "TaskCompletedEvent"
        || activity_type == "TaskPuntedEvent"
    {
        Some(ChangeType::Updated)
    } else {
        None
    }
}

fn entity_data_matches_date(entity_type: EntityKind, data: &Value, target_date: NaiveDate) -> bool {
    let target = target_date.to_string();
    match entity_type {
        EntityKind::Task => data
            .get("scheduled_date")
            .and_then(Value::as_str)
            .is_some_and(|value| value == target),
        EntityKind::Day | EntityKind::BrainDumpItem => data
            .get("date")
            .and_then(Value::as_str)
            .is_some_and(|value| value == target),
        EntityKind::CalendarEntry => data
            .get("starts_at")
            .and_then(Value::as_str)
            .and_then(|value| value.split('T').next())
            .is_some_and(|value| value == target),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ChangeType, derive_change_type};

    #[test]
    fn created_and_updated_and_deleted_are_derived_from_known_suffixes() {
        assert_eq!(derive_change_type("TaskCreatedEvent"), Some(ChangeType::Created));
        assert_eq!(derive_change_type("DayUpdatedEvent"), Some(ChangeType::Updated));
        assert_eq!(
            derive_change_type("CalendarEntryDeletedEvent"),
            Some(ChangeType::Deleted)
        );
        assert_eq!(derive_change_type("TaskCompletedEvent"), Some(ChangeType::Updated));
        assert_eq!(derive_change_type("TaskPuntedEvent"), Some(ChangeType::Updated));
    }

    #[test]
    fn unrecognized_activity_type_is_skipped() {
        assert_eq!(derive_change_type("NewDayEvent"), None);
        let _ = json!({});
    }
}
