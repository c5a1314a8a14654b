use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::EntityKind;

/// Alarm delivery channel, shared between `Day.alarms` and the
/// calendar-entry-reminder `KIOSK_ALARM` synthetic alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmType {
    Gentle,
    Firm,
    Loud,
    Siren,
    Kiosk,
    Url,
}

impl AlarmType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gentle => "GENTLE",
            Self::Firm => "FIRM",
            Self::Loud => "LOUD",
            Self::Siren => "SIREN",
            Self::Kiosk => "KIOSK",
            Self::Url => "URL",
        }
    }
}

/// The payload-specific half of a [`DomainEvent`]. Every variant maps to an
/// `activity_type` string via [`DomainEvent::activity_type`] — that string,
/// not the Rust variant name, is what crosses the audit-log/pub-sub boundary
/// and what `is_audit_log_for_today`'s change-type derivation matches on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEventKind {
    /// Emitted the first time an aggregate's `drain_events()` observes it,
    /// per the `is_new` flag described in the design notes.
    Created { entity_data: Value },
    Updated { entity_data: Value },
    Deleted,
    AlarmTriggered {
        alarm_id: Uuid,
        alarm_type: AlarmType,
    },
    TaskCompleted { entity_data: Value },
    TaskPunted { entity_data: Value },
    CalendarEntrySeriesUpdated { entity_data: Value },
    CalendarEntryUpdated { entity_data: Value },
    /// Not a per-entity mutation; published only to `domain-events`, never
    /// audited (§6.2).
    NewDay,
}

/// An event as an aggregate records it, before the UoW has assigned it an
/// `occurred_at`. Aggregates push these onto their own pending buffer;
/// `drain_events()` hands the buffer to the UoW, which stamps each one with
/// the commit's timestamp on its way to becoming a [`DomainEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEvent {
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub kind: DomainEventKind,
}

impl PendingEvent {
    pub fn new(entity_type: EntityKind, entity_id: Uuid, kind: DomainEventKind) -> Self {
        Self {
            entity_type,
            entity_id,
            kind,
        }
    }

    pub fn stamp(self, user_id: Uuid, occurred_at: DateTime<Utc>) -> DomainEvent {
        DomainEvent {
            user_id,
            occurred_at,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub user_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub kind: DomainEventKind,
}

impl DomainEvent {

    /// The `activity_type` string persisted onto the `AuditLog` row and
    /// matched by `is_audit_log_for_today`'s change-type derivation
    /// (spec §4.8.1).
    pub fn activity_type(&self) -> String {
        let entity = self.entity_type.as_str();
        match &self.kind {
            DomainEventKind::Created { .. } => format!("{entity}CreatedEvent"),
            DomainEventKind::Updated { .. } => format!("{entity}UpdatedEvent"),
            DomainEventKind::Deleted => format!("{entity}DeletedEvent"),
            DomainEventKind::AlarmTriggered { .. } => "AlarmTriggeredEvent".to_string(),
            DomainEventKind::TaskCompleted { .. } => "TaskCompletedEvent".to_string(),
            DomainEventKind::TaskPunted { .. } => "TaskPuntedEvent".to_string(),
            DomainEventKind::CalendarEntrySeriesUpdated { .. } => {
                "CalendarEntrySeriesUpdatedEvent".to_string()
            }
            DomainEventKind::CalendarEntryUpdated { .. } => "CalendarEntryUpdatedEvent".to_string(),
            DomainEventKind::NewDay => "NewDayEvent".to_string(),
        }
    }

    /// Whether the UoW must synthesize an `AuditLog` row for this event
    /// before commit (spec §4.1 step 3). `NewDayEvent` is the one kind that
    /// is not a per-entity mutation and is excluded (§6.2).
    pub fn is_auditable(&self) -> bool {
        !matches!(self.kind, DomainEventKind::NewDay)
    }

    /// `meta.entity_data` for the audit row; `None` only for deletions and
    /// for `NewDayEvent`, which isn't a per-entity mutation at all (spec:
    /// "entity_data is null only for deletions").
    pub fn entity_data(&self) -> Option<&Value> {
        match &self.kind {
            DomainEventKind::Created { entity_data }
            | DomainEventKind::Updated { entity_data }
            | DomainEventKind::TaskCompleted { entity_data }
            | DomainEventKind::TaskPunted { entity_data }
            | DomainEventKind::CalendarEntrySeriesUpdated { entity_data }
            | DomainEventKind::CalendarEntryUpdated { entity_data } => Some(entity_data),
            DomainEventKind::Deleted | DomainEventKind::AlarmTriggered { .. } | DomainEventKind::NewDay => {
                None
            }
        }
    }
}
