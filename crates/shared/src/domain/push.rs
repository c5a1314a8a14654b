use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::PendingEvent;
use super::llm_run_result::LlmRunResultSnapshot;
use super::{Aggregate, DomainEventKind, EntityKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl PushSubscription {
    pub fn create(id: Uuid, user_id: Uuid, endpoint: String, p256dh: String, auth: String) -> Self {
        let mut subscription = Self {
            id,
            user_id,
            endpoint,
            p256dh,
            auth,
            is_new: true,
            pending_events: Vec::new(),
        };
        subscription.record_event();
        subscription
    }

    fn record_event(&mut self) {
        let entity_data = self.snapshot();
        let kind = if self.is_new {
            DomainEventKind::Created { entity_data }
        } else {
            DomainEventKind::Updated { entity_data }
        };
        self.pending_events.push(PendingEvent::new(
            EntityKind::PushSubscription,
            self.id,
            kind,
        ));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("PushSubscription always serializes")
    }
}

impl Aggregate for PushSubscription {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::PushSubscription
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushNotificationStatus {
    Success,
    Skipped,
    Error,
}

impl PushNotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub push_subscription_ids: Vec<Uuid>,
    pub content: String,
    pub status: PushNotificationStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub triggered_by: Option<String>,
    pub llm_run_result: Option<LlmRunResultSnapshot>,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl PushNotification {
    pub fn create(
        id: Uuid,
        user_id: Uuid,
        push_subscription_ids: Vec<Uuid>,
        content: String,
        status: PushNotificationStatus,
        error_message: Option<String>,
        sent_at: Option<DateTime<Utc>>,
        triggered_by: Option<String>,
    ) -> Self {
        let mut notification = Self {
            id,
            user_id,
            push_subscription_ids,
            content,
            status,
            error_message,
            sent_at,
            triggered_by,
            llm_run_result: None,
            is_new: true,
            pending_events: Vec::new(),
        };
        notification.record_event();
        notification
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
        self.pending_events.push(PendingEvent::new(
            EntityKind::PushNotification,
            self.id,
            kind,
        ));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("PushNotification always serializes")
    }
}

impl Aggregate for PushNotification {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::PushNotification
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}
