use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::PendingEvent;
use super::{Aggregate, DomainEventKind, EntityKind};
use crate::ids::day_template_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBlock {
    pub time_block_def_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighLevelPlan {
    pub title: String,
    pub text: String,
    pub intentions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slug: String,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub routine_definition_ids: Vec<Uuid>,
    pub time_blocks: Vec<TimeBlock>,
    pub high_level_plan: HighLevelPlan,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl DayTemplate {
    pub fn create(user_id: Uuid, slug: String) -> Self {
        let id = day_template_id(user_id, &slug);
        let mut template = Self {
            id,
            user_id,
            slug,
            start_time: None,
            end_time: None,
            routine_definition_ids: Vec::new(),
            time_blocks: Vec::new(),
            high_level_plan: HighLevelPlan::default(),
            is_new: true,
            pending_events: Vec::new(),
        };
        template.record_event();
        template
    }

    pub fn from_persisted(
        id: Uuid,
        user_id: Uuid,
        slug: String,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
        routine_definition_ids: Vec<Uuid>,
        time_blocks: Vec<TimeBlock>,
        high_level_plan: HighLevelPlan,
    ) -> Self {
        Self {
            id,
            user_id,
            slug,
            start_time,
            end_time,
            routine_definition_ids,
            time_blocks,
            high_level_plan,
            is_new: false,
            pending_events: Vec::new(),
        }
    }

    pub fn set_time_blocks(&mut self, time_blocks: Vec<TimeBlock>) {
        self.time_blocks = time_blocks;
        self.record_event();
    }

    pub fn set_high_level_plan(&mut self, plan: HighLevelPlan) {
        self.high_level_plan = plan;
        self.record_event();
    }

    pub fn set_routine_definition_ids(&mut self, routine_definition_ids: Vec<Uuid>) {
        self.routine_definition_ids = routine_definition_ids;
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
            .push(PendingEvent::new(EntityKind::DayTemplate, self.id, kind));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("DayTemplate always serializes")
    }
}

impl Aggregate for DayTemplate {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::DayTemplate
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::DayTemplate;
    use crate::ids::day_template_id;

    #[test]
    fn create_assigns_deterministic_id_and_emits_created() {
        let user_id = Uuid::new_v4();
        let mut template = DayTemplate::create(user_id, "default".to_string());
        assert_eq!(template.id, day_template_id(user_id, "default"));

        let events = crate::domain::Aggregate::drain_events(&mut template);
        assert_eq!(events.len(), 1);
    }
}
