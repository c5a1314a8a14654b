use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::PendingEvent;
use super::llm_run_result::LlmRunResultSnapshot;
use super::{Aggregate, DomainEventKind, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    NotStarted,
    Ready,
    NotReady,
    Pending,
    Punted,
    Complete,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Ready => "READY",
            Self::NotReady => "NOT_READY",
            Self::Pending => "PENDING",
            Self::Punted => "PUNTED",
            Self::Complete => "COMPLETE",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "NOT_STARTED" => Some(Self::NotStarted),
            "READY" => Some(Self::Ready),
            "NOT_READY" => Some(Self::NotReady),
            "PENDING" => Some(Self::Pending),
            "PUNTED" => Some(Self::Punted),
            "COMPLETE" => Some(Self::Complete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingType {
    Deadline,
    FixedTime,
    TimeWindow,
    Flexible,
}

impl TimingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deadline => "DEADLINE",
            Self::FixedTime => "FIXED_TIME",
            Self::TimeWindow => "TIME_WINDOW",
            Self::Flexible => "FLEXIBLE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindow {
    pub timing_type: TimingType,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

/// Known risk-scored categories carry their own variant (spec §4.5.5); any
/// other category name the planner uses passes through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskCategory {
    Avoidant,
    Forgettable,
    Urgent,
    Other(String),
}

impl TaskCategory {
    pub fn from_str(value: &str) -> Self {
        match value {
            "AVOIDANT" => Self::Avoidant,
            "FORGETTABLE" => Self::Forgettable,
            "URGENT" => Self::Urgent,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Avoidant => "AVOIDANT",
            Self::Forgettable => "FORGETTABLE",
            Self::Urgent => "URGENT",
            Self::Other(value) => value,
        }
    }

    /// Weight contributed toward the Task Risk score (spec §4.5.5).
    pub fn risk_weight(&self) -> u32 {
        match self {
            Self::Avoidant => 30,
            Self::Forgettable => 25,
            Self::Urgent => 20,
            Self::Other(_) => 0,
        }
    }
}

/// A recurrence cadence; only `Daily` is special-cased by the risk formula
/// (DAILY-frequency tasks are excluded, spec §4.5.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskFrequency {
    Daily,
    Other(String),
}

impl TaskFrequency {
    pub fn from_str(value: &str) -> Self {
        if value == "DAILY" {
            Self::Daily
        } else {
            Self::Other(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Daily => "DAILY",
            Self::Other(value) => value,
        }
    }

    pub fn is_daily(&self) -> bool {
        matches!(self, Self::Daily)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAction {
    pub action: String,
    pub occurred_at: DateTime<Utc>,
    pub meta: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub scheduled_date: chrono::NaiveDate,
    pub name: String,
    pub status: TaskStatus,
    pub category: TaskCategory,
    pub task_type: String,
    pub frequency: TaskFrequency,
    pub schedule: Option<TimeWindow>,
    pub routine_definition_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub actions: Vec<TaskAction>,
    pub completed_at: Option<DateTime<Utc>>,
    pub llm_run_result: Option<LlmRunResultSnapshot>,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: Uuid,
        user_id: Uuid,
        scheduled_date: chrono::NaiveDate,
        name: String,
        category: TaskCategory,
        task_type: String,
        frequency: TaskFrequency,
        schedule: Option<TimeWindow>,
        routine_definition_id: Option<Uuid>,
        tags: Vec<String>,
    ) -> Self {
        let mut task = Self {
            id,
            user_id,
            scheduled_date,
            name,
            status: TaskStatus::NotStarted,
            category,
            task_type,
            frequency,
            schedule,
            routine_definition_id,
            tags,
            actions: Vec::new(),
            completed_at: None,
            llm_run_result: None,
            is_new: true,
            pending_events: Vec::new(),
        };
        task.record_event();
        task
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: Uuid,
        user_id: Uuid,
        scheduled_date: chrono::NaiveDate,
        name: String,
        status: TaskStatus,
        category: TaskCategory,
        task_type: String,
        frequency: TaskFrequency,
        schedule: Option<TimeWindow>,
        routine_definition_id: Option<Uuid>,
        tags: Vec<String>,
        actions: Vec<TaskAction>,
        completed_at: Option<DateTime<Utc>>,
        llm_run_result: Option<LlmRunResultSnapshot>,
    ) -> Self {
        Self {
            id,
            user_id,
            scheduled_date,
            name,
            status,
            category,
            task_type,
            frequency,
            schedule,
            routine_definition_id,
            tags,
            actions,
            completed_at,
            llm_run_result,
            is_new: false,
            pending_events: Vec::new(),
        }
    }

    pub fn is_adhoc(&self) -> bool {
        self.routine_definition_id.is_none()
    }

    /// Appends an action and derives a status transition; the only action
    /// kinds that matter to the reactive/risk layers are `complete` and
    /// `punt` (spec §4.5.5 references `TaskCompletedEvent`/`TaskPuntedEvent`).
    pub fn record_action(&mut self, action: &str, now: DateTime<Utc>, meta: Value) {
        self.actions.push(TaskAction {
            action: action.to_string(),
            occurred_at: now,
            meta,
        });

        match action {
            "complete" => {
                self.status = TaskStatus::Complete;
                self.completed_at = Some(now);
                let entity_data = self.snapshot();
                self.pending_events.push(PendingEvent::new(
                    EntityKind::Task,
                    self.id,
                    DomainEventKind::TaskCompleted { entity_data },
                ));
            }
            "punt" => {
                self.status = TaskStatus::Punted;
                let entity_data = self.snapshot();
                self.pending_events.push(PendingEvent::new(
                    EntityKind::Task,
                    self.id,
                    DomainEventKind::TaskPunted { entity_data },
                ));
            }
            _ => self.record_event(),
        }
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.record_event();
    }

    pub fn attach_llm_run_result(&mut self, snapshot: LlmRunResultSnapshot) {
        self.llm_run_result = Some(snapshot);
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
            .push(PendingEvent::new(EntityKind::Task, self.id, kind));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("Task always serializes")
    }
}

impl Aggregate for Task {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Task
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use serde_json::json;
    use uuid::Uuid;

    use super::{Task, TaskCategory, TaskFrequency, TaskStatus};
    use crate::domain::Aggregate;
    use crate::domain::events::DomainEventKind;

    fn sample_task() -> Task {
        Task::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date"),
            "Brush teeth".to_string(),
            TaskCategory::from_str("HYGIENE"),
            "routine".to_string(),
            TaskFrequency::from_str("DAILY"),
            None,
            Some(Uuid::new_v4()),
            Vec::new(),
        )
    }

    #[test]
    fn record_action_complete_sets_status_and_emits_completed_event() {
        let mut task = sample_task();
        task.drain_events();

        task.record_action("complete", Utc::now(), json!({}));
        assert_eq!(task.status, TaskStatus::Complete);
        assert!(task.completed_at.is_some());

        let events = task.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].kind, DomainEventKind::TaskCompleted { .. }));
    }

    #[test]
    fn adhoc_task_has_no_routine_definition() {
        let task = Task::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date"),
            "Buy milk".to_string(),
            TaskCategory::from_str("ERRAND"),
            "adhoc".to_string(),
            TaskFrequency::from_str("ONCE"),
            None,
            None,
            Vec::new(),
        );
        assert!(task.is_adhoc());
    }
}
