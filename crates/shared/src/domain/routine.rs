use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::PendingEvent;
use super::task::{TaskCategory, TaskFrequency, TimeWindow};
use super::{Aggregate, DomainEventKind, EntityKind};
use crate::timezone::weekday_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceSchedule {
    pub frequency: RecurrenceFrequency,
    /// Monday = 0 .. Sunday = 6, only meaningful for `Weekly`.
    pub weekdays: Vec<usize>,
    /// Day-of-month, only meaningful for `Monthly`.
    pub day_number: Option<u32>,
}

impl RecurrenceSchedule {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self.frequency {
            RecurrenceFrequency::Daily => true,
            RecurrenceFrequency::Weekly => self.weekdays.contains(&weekday_index(date)),
            RecurrenceFrequency::Monthly => self.day_number == Some(date.day()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineTaskTemplate {
    pub id: Uuid,
    pub name: String,
    pub category: TaskCategory,
    pub task_type: String,
    pub frequency: TaskFrequency,
    pub schedule: Option<TimeWindow>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineDefinition {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub recurrence: RecurrenceSchedule,
    pub routine_tasks: Vec<RoutineTaskTemplate>,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl RoutineDefinition {
    pub fn create(
        id: Uuid,
        user_id: Uuid,
        name: String,
        recurrence: RecurrenceSchedule,
        routine_tasks: Vec<RoutineTaskTemplate>,
    ) -> Self {
        let mut routine = Self {
            id,
            user_id,
            name,
            recurrence,
            routine_tasks,
            is_new: true,
            pending_events: Vec::new(),
        };
        routine.record_event();
        routine
    }

    pub fn from_persisted(
        id: Uuid,
        user_id: Uuid,
        name: String,
        recurrence: RecurrenceSchedule,
        routine_tasks: Vec<RoutineTaskTemplate>,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            recurrence,
            routine_tasks,
            is_new: false,
            pending_events: Vec::new(),
        }
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.recurrence.matches(date)
    }

    fn record_event(&mut self) {
        let entity_data = self.snapshot();
        let kind = if self.is_new {
            DomainEventKind::Created { entity_data }
        } else {
            DomainEventKind::Updated { entity_data }
        };
        self.pending_events.push(PendingEvent::new(
            EntityKind::RoutineDefinition,
            self.id,
            kind,
        ));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("RoutineDefinition always serializes")
    }
}

impl Aggregate for RoutineDefinition {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::RoutineDefinition
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{RecurrenceFrequency, RecurrenceSchedule};

    #[test]
    fn weekly_schedule_matches_only_configured_weekdays() {
        let schedule = RecurrenceSchedule {
            frequency: RecurrenceFrequency::Weekly,
            weekdays: vec![3],
            day_number: None,
        };
        let thursday = NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date");
        let friday = NaiveDate::from_ymd_opt(2025, 11, 28).expect("valid date");
        assert!(schedule.matches(thursday));
        assert!(!schedule.matches(friday));
    }

    #[test]
    fn daily_schedule_always_matches() {
        let schedule = RecurrenceSchedule {
            frequency: RecurrenceFrequency::Daily,
            weekdays: Vec::new(),
            day_number: None,
        };
        let any_date = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
        assert!(schedule.matches(any_date));
    }
}
