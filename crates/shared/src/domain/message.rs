use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::PendingEvent;
use super::llm_run_result::LlmRunResultSnapshot;
use super::{Aggregate, DomainEventKind, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
            Self::System => "SYSTEM",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub meta: HashMap<String, Value>,
    pub triggered_by: Option<String>,
    pub llm_run_result: Option<LlmRunResultSnapshot>,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl Message {
    pub fn create(
        id: Uuid,
        user_id: Uuid,
        role: MessageRole,
        content: String,
        meta: HashMap<String, Value>,
        triggered_by: Option<String>,
    ) -> Self {
        let mut message = Self {
            id,
            user_id,
            role,
            content,
            meta,
            triggered_by,
            llm_run_result: None,
            is_new: true,
            pending_events: Vec::new(),
        };
        message.record_event();
        message
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
            .push(PendingEvent::new(EntityKind::Message, self.id, kind));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("Message always serializes")
    }
}

impl Aggregate for Message {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Message
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}
