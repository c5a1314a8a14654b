use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::PendingEvent;
use super::task::{TaskCategory, TaskFrequency};
use super::{Aggregate, DomainEventKind, EntityKind};
use crate::ids::calendar_entry_series_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Going,
    NotGoing,
    Tentative,
    Unknown,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Going => "GOING",
            Self::NotGoing => "NOT_GOING",
            Self::Tentative => "TENTATIVE",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "GOING" => Self::Going,
            "NOT_GOING" => Self::NotGoing,
            "TENTATIVE" => Self::Tentative,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntrySeries {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: String,
    pub series_platform_id: String,
    pub name: String,
    pub frequency: TaskFrequency,
    pub category: TaskCategory,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl CalendarEntrySeries {
    pub fn create(
        user_id: Uuid,
        platform: String,
        series_platform_id: String,
        name: String,
        frequency: TaskFrequency,
        category: TaskCategory,
        starts_at: DateTime<Utc>,
    ) -> Self {
        let id = calendar_entry_series_id(&platform, &series_platform_id);
        let mut series = Self {
            id,
            user_id,
            platform,
            series_platform_id,
            name,
            frequency,
            category,
            starts_at,
            ends_at: None,
            is_new: true,
            pending_events: Vec::new(),
        };
        series.record_event();
        series
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: Uuid,
        user_id: Uuid,
        platform: String,
        series_platform_id: String,
        name: String,
        frequency: TaskFrequency,
        category: TaskCategory,
        starts_at: DateTime<Utc>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            platform,
            series_platform_id,
            name,
            frequency,
            category,
            starts_at,
            ends_at,
            is_new: false,
            pending_events: Vec::new(),
        }
    }

    /// True if `name`/`frequency`/`category`/`starts_at`/`ends_at` differ
    /// from the upstream-reported fields — the condition that triggers the
    /// series-cascade rule (spec §4.4 step 3).
    pub fn differs_from(
        &self,
        name: &str,
        frequency: &TaskFrequency,
        category: &TaskCategory,
        starts_at: DateTime<Utc>,
        ends_at: Option<DateTime<Utc>>,
    ) -> bool {
        self.name != name
            || &self.frequency != frequency
            || &self.category != category
            || self.starts_at != starts_at
            || self.ends_at != ends_at
    }

    pub fn apply_upstream_fields(
        &mut self,
        name: String,
        frequency: TaskFrequency,
        category: TaskCategory,
        starts_at: DateTime<Utc>,
        ends_at: Option<DateTime<Utc>>,
    ) {
        self.name = name;
        self.frequency = frequency;
        self.category = category;
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self.record_event();
    }

    pub fn end_now(&mut self, now: DateTime<Utc>) {
        self.ends_at = Some(now);
        self.record_event();
    }

    fn record_event(&mut self) {
        let entity_data = self.snapshot();
        let kind = if self.is_new {
            DomainEventKind::Created { entity_data }
        } else {
            DomainEventKind::CalendarEntrySeriesUpdated { entity_data }
        };
        self.pending_events.push(PendingEvent::new(
            EntityKind::CalendarEntrySeries,
            self.id,
            kind,
        ));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("CalendarEntrySeries always serializes")
    }
}

impl Aggregate for CalendarEntrySeries {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::CalendarEntrySeries
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: String,
    pub platform_id: String,
    pub series_id: Option<Uuid>,
    pub name: String,
    pub frequency: TaskFrequency,
    pub category: TaskCategory,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub attendance_status: AttendanceStatus,
    pub deleted: bool,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl CalendarEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: Uuid,
        user_id: Uuid,
        platform: String,
        platform_id: String,
        series_id: Option<Uuid>,
        name: String,
        frequency: TaskFrequency,
        category: TaskCategory,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            id,
            user_id,
            platform,
            platform_id,
            series_id,
            name,
            frequency,
            category,
            starts_at,
            ends_at,
            attendance_status: AttendanceStatus::Unknown,
            deleted: false,
            is_new: true,
            pending_events: Vec::new(),
        };
        entry.record_event();
        entry
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: Uuid,
        user_id: Uuid,
        platform: String,
        platform_id: String,
        series_id: Option<Uuid>,
        name: String,
        frequency: TaskFrequency,
        category: TaskCategory,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        attendance_status: AttendanceStatus,
        deleted: bool,
    ) -> Self {
        Self {
            id,
            user_id,
            platform,
            platform_id,
            series_id,
            name,
            frequency,
            category,
            starts_at,
            ends_at,
            attendance_status,
            deleted,
            is_new: false,
            pending_events: Vec::new(),
        }
    }

    /// Applies the series' current fields to this entry — the per-entry
    /// half of the series-cascade rule (spec §4.4.1). Always records an
    /// `Updated` event; callers emit exactly one per affected entry.
    pub fn apply_series_fields(
        &mut self,
        name: String,
        frequency: TaskFrequency,
        category: TaskCategory,
    ) {
        self.name = name;
        self.frequency = frequency;
        self.category = category;
        let entity_data = self.snapshot();
        self.pending_events.push(PendingEvent::new(
            EntityKind::CalendarEntry,
            self.id,
            DomainEventKind::CalendarEntryUpdated { entity_data },
        ));
    }

    pub fn apply_upstream_fields(
        &mut self,
        name: String,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        attendance_status: AttendanceStatus,
    ) {
        self.name = name;
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self.attendance_status = attendance_status;
        self.record_event();
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.pending_events.push(PendingEvent::new(
            EntityKind::CalendarEntry,
            self.id,
            DomainEventKind::Deleted,
        ));
    }

    fn record_event(&mut self) {
        let entity_data = self.snapshot();
        let kind = if self.is_new {
            DomainEventKind::Created { entity_data }
        } else {
            DomainEventKind::Updated { entity_data }
        };
        self.pending_events
            .push(PendingEvent::new(EntityKind::CalendarEntry, self.id, kind));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("CalendarEntry always serializes")
    }
}

impl Aggregate for CalendarEntry {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::CalendarEntry
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}

/// Per-user, per-provider sync state (spec §4.4 step 7: `calendar.sync_token`
/// / `calendar.last_sync_at`). Auth token storage/refresh is delegated to
/// the `CalendarGateway` implementation — out of scope here (spec §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: String,
    pub calendar_id: String,
    pub sync_token: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl CalendarAccount {
    pub fn create(id: Uuid, user_id: Uuid, platform: String, calendar_id: String) -> Self {
        let mut account = Self {
            id,
            user_id,
            platform,
            calendar_id,
            sync_token: None,
            last_sync_at: None,
            is_new: true,
            pending_events: Vec::new(),
        };
        account.record_event();
        account
    }

    pub fn from_persisted(
        id: Uuid,
        user_id: Uuid,
        platform: String,
        calendar_id: String,
        sync_token: Option<String>,
        last_sync_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            platform,
            calendar_id,
            sync_token,
            last_sync_at,
            is_new: false,
            pending_events: Vec::new(),
        }
    }

    pub fn record_sync(&mut self, sync_token: Option<String>, now: DateTime<Utc>) {
        self.sync_token = sync_token;
        self.last_sync_at = Some(now);
        self.record_event();
    }

    fn record_event(&mut self) {
        let entity_data = self.snapshot();
        let kind = if self.is_new {
            DomainEventKind::Created { entity_data }
        } else {
            DomainEventKind::Updated { entity_data }
        };
        self.pending_events
            .push(PendingEvent::new(EntityKind::CalendarAccount, self.id, kind));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("CalendarAccount always serializes")
    }
}

impl Aggregate for CalendarAccount {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::CalendarAccount
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}
