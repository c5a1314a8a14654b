use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::day_template::{DayTemplate, HighLevelPlan, TimeBlock};
use super::events::PendingEvent;
use super::{Aggregate, AlarmType, DomainEventKind, EntityKind};
use crate::ids::day_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayStatus {
    Unscheduled,
    Scheduled,
    InProgress,
    Complete,
}

impl DayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unscheduled => "UNSCHEDULED",
            Self::Scheduled => "SCHEDULED",
            Self::InProgress => "IN_PROGRESS",
            Self::Complete => "COMPLETE",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "UNSCHEDULED" => Some(Self::Unscheduled),
            "SCHEDULED" => Some(Self::Scheduled),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETE" => Some(Self::Complete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub id: Uuid,
    pub name: String,
    pub time: NaiveTime,
    pub datetime: DateTime<Utc>,
    pub alarm_type: AlarmType,
    pub triggered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Day {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub status: DayStatus,
    pub template_id: Option<Uuid>,
    pub time_blocks: Vec<TimeBlock>,
    pub high_level_plan: HighLevelPlan,
    pub alarms: Vec<Alarm>,
    pub tags: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// True only until the day's first persisted snapshot — lazy creation
    /// (spec §3.3) means the struct can exist in memory, unscheduled, before
    /// it has ever been added to a UoW.
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl Day {
    /// The in-memory placeholder for "no Day row exists yet for this date".
    /// Does not record an event on its own — only a subsequent mutation
    /// (`schedule`, first alarm trigger, …) makes it worth persisting.
    pub fn new_unscheduled(user_id: Uuid, date: NaiveDate) -> Self {
        Self {
            id: day_id(user_id, date),
            user_id,
            date,
            status: DayStatus::Unscheduled,
            template_id: None,
            time_blocks: Vec::new(),
            high_level_plan: HighLevelPlan::default(),
            alarms: Vec::new(),
            tags: Vec::new(),
            scheduled_at: None,
            is_new: true,
            pending_events: Vec::new(),
        }
    }

    pub fn from_persisted(
        id: Uuid,
        user_id: Uuid,
        date: NaiveDate,
        status: DayStatus,
        template_id: Option<Uuid>,
        time_blocks: Vec<TimeBlock>,
        high_level_plan: HighLevelPlan,
        alarms: Vec<Alarm>,
        tags: Vec<String>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            date,
            status,
            template_id,
            time_blocks,
            high_level_plan,
            alarms,
            tags,
            scheduled_at,
            is_new: false,
            pending_events: Vec::new(),
        }
    }

    /// Copies `template.time_blocks` and `template.high_level_plan` onto the
    /// Day and moves it to `SCHEDULED` (spec §4.3 step 4). A Day that was
    /// lazily constructed (still `UNSCHEDULED`) emits `DayCreatedEvent`; an
    /// already-scheduled Day being re-scheduled emits `DayUpdatedEvent`
    /// (DESIGN.md's resolution of the Created-vs-Updated open question).
    pub fn schedule(&mut self, template: &DayTemplate, now: DateTime<Utc>) {
        self.template_id = Some(template.id);
        self.time_blocks = template.time_blocks.clone();
        self.high_level_plan = template.high_level_plan.clone();
        self.status = DayStatus::Scheduled;
        self.scheduled_at = Some(now);
        self.record_event();
    }

    pub fn unschedule(&mut self) {
        self.status = DayStatus::Unscheduled;
        self.template_id = None;
        self.time_blocks.clear();
        self.high_level_plan = HighLevelPlan::default();
        self.record_event();
    }

    pub fn mark_in_progress(&mut self) {
        if self.status == DayStatus::Scheduled {
            self.status = DayStatus::InProgress;
            self.record_event();
        }
    }

    pub fn complete(&mut self) {
        self.status = DayStatus::Complete;
        self.record_event();
    }

    pub fn add_alarm(&mut self, alarm: Alarm) {
        self.alarms.push(alarm);
        self.record_event();
    }

    /// Marks every alarm due at or before `now` and not yet triggered,
    /// returning the ids triggered so the caller can emit one
    /// `AlarmTriggeredEvent` per alarm (spec §4.5.1).
    pub fn trigger_due_alarms(&mut self, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut triggered = Vec::new();
        for alarm in &mut self.alarms {
            if alarm.triggered_at.is_none() && alarm.datetime <= now {
                alarm.triggered_at = Some(now);
                triggered.push(alarm.id);
            }
        }
        if !triggered.is_empty() {
            let entity_data = self.snapshot();
            for alarm_id in &triggered {
                let alarm_type = self
                    .alarms
                    .iter()
                    .find(|a| a.id == *alarm_id)
                    .map(|a| a.alarm_type)
                    .unwrap_or(AlarmType::Gentle);
                self.pending_events.push(PendingEvent::new(
                    EntityKind::Day,
                    self.id,
                    DomainEventKind::AlarmTriggered {
                        alarm_id: *alarm_id,
                        alarm_type,
                    },
                ));
            }
            self.pending_events.push(PendingEvent::new(
                EntityKind::Day,
                self.id,
                DomainEventKind::Updated { entity_data },
            ));
        }
        triggered
    }

    /// Synthesizes a `KIOSK_ALARM` trigger event without persisting an
    /// `Alarm` value object on the Day (spec §4.5.2's `KIOSK_ALARM` branch).
    pub fn emit_synthetic_kiosk_alarm(&mut self, alarm_id: Uuid) {
        self.pending_events.push(PendingEvent::new(
            EntityKind::Day,
            self.id,
            DomainEventKind::AlarmTriggered {
                alarm_id,
                alarm_type: AlarmType::Kiosk,
            },
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
            .push(PendingEvent::new(EntityKind::Day, self.id, kind));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("Day always serializes")
    }
}

impl Aggregate for Day {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Day
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::{Day, DayStatus};
    use crate::domain::Aggregate;
    use crate::domain::day_template::DayTemplate;
    use crate::domain::events::DomainEventKind;

    #[test]
    fn schedule_on_unscheduled_day_emits_created() {
        let user_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date");
        let mut day = Day::new_unscheduled(user_id, date);
        let template = DayTemplate::create(user_id, "default".to_string());

        day.schedule(&template, Utc::now());
        assert_eq!(day.status, DayStatus::Scheduled);

        let events = day.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].kind, DomainEventKind::Created { .. }));
    }

    #[test]
    fn rescheduling_an_already_scheduled_day_emits_updated() {
        let user_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date");
        let mut day = Day::new_unscheduled(user_id, date);
        let template = DayTemplate::create(user_id, "default".to_string());

        day.schedule(&template, Utc::now());
        day.drain_events();

        day.schedule(&template, Utc::now());
        let events = day.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].kind, DomainEventKind::Updated { .. }));
    }
}
