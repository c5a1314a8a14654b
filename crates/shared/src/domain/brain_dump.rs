use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::PendingEvent;
use super::llm_run_result::LlmRunResultSnapshot;
use super::{Aggregate, DomainEventKind, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrainDumpStatus {
    Pending,
    Processed,
    Discarded,
}

impl BrainDumpStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processed => "PROCESSED",
            Self::Discarded => "DISCARDED",
        }
    }
}

/// Restored per SPEC_FULL.md §3 — the glossary and §4.7's
/// `schedule_process_brain_dump_item` reference this concept without the
/// distilled spec defining it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainDumpItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub day_date: NaiveDate,
    pub raw_text: String,
    pub status: BrainDumpStatus,
    pub resulting_task_id: Option<Uuid>,
    pub llm_run_result: Option<LlmRunResultSnapshot>,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl BrainDumpItem {
    pub fn create(id: Uuid, user_id: Uuid, day_date: NaiveDate, raw_text: String) -> Self {
        let mut item = Self {
            id,
            user_id,
            day_date,
            raw_text,
            status: BrainDumpStatus::Pending,
            resulting_task_id: None,
            llm_run_result: None,
            is_new: true,
            pending_events: Vec::new(),
        };
        item.record_event();
        item
    }

    pub fn mark_processed(&mut self, resulting_task_id: Uuid, snapshot: LlmRunResultSnapshot) {
        self.status = BrainDumpStatus::Processed;
        self.resulting_task_id = Some(resulting_task_id);
        self.llm_run_result = Some(snapshot);
        self.record_event();
    }

    pub fn mark_discarded(&mut self, snapshot: LlmRunResultSnapshot) {
        self.status = BrainDumpStatus::Discarded;
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
            .push(PendingEvent::new(EntityKind::BrainDumpItem, self.id, kind));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("BrainDumpItem always serializes")
    }
}

impl Aggregate for BrainDumpItem {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::BrainDumpItem
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}
