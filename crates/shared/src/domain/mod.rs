pub mod audit_log;
pub mod brain_dump;
pub mod calendar;
pub mod day;
pub mod day_template;
pub mod events;
pub mod llm_run_result;
pub mod message;
pub mod push;
pub mod routine;
pub mod task;
pub mod user;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use events::{AlarmType, DomainEvent, DomainEventKind, PendingEvent};

/// Discriminates persisted aggregate tables; doubles as the `entity_type`
/// string on `AuditLog` rows and the `activity_type` prefix on events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    DayTemplate,
    Day,
    Task,
    RoutineDefinition,
    CalendarEntry,
    CalendarEntrySeries,
    CalendarAccount,
    Message,
    PushSubscription,
    PushNotification,
    BrainDumpItem,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::DayTemplate => "DayTemplate",
            Self::Day => "Day",
            Self::Task => "Task",
            Self::RoutineDefinition => "RoutineDefinition",
            Self::CalendarEntry => "CalendarEntry",
            Self::CalendarEntrySeries => "CalendarEntrySeries",
            Self::CalendarAccount => "CalendarAccount",
            Self::Message => "Message",
            Self::PushSubscription => "PushSubscription",
            Self::PushNotification => "PushNotification",
            Self::BrainDumpItem => "BrainDumpItem",
        }
    }
}

/// Shared behavior `UnitOfWork::add` relies on: identity, a drainable event
/// buffer, and a way to persist the current snapshot. Mirrors spec §4.1's
/// "entities passed to `add()`" contract.
pub trait Aggregate {
    fn id(&self) -> Uuid;
    fn kind(&self) -> EntityKind;

    /// Drains the aggregate's pending event buffer. The UoW stamps each
    /// returned [`PendingEvent`] with `user_id`/`occurred_at` at commit time
    /// (spec §4.1 step 3), so every event produced by one commit shares a
    /// single timestamp.
    fn drain_events(&mut self) -> Vec<PendingEvent>;
}
