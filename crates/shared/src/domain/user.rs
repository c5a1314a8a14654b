use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::PendingEvent;
use super::{Aggregate, DomainEventKind, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationChannel {
    Push,
    Text,
    KioskAlarm,
}

impl NotificationChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "PUSH",
            Self::Text => "TEXT",
            Self::KioskAlarm => "KIOSK_ALARM",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PUSH" => Some(Self::Push),
            "TEXT" => Some(Self::Text),
            "KIOSK_ALARM" => Some(Self::KioskAlarm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntryNotificationRule {
    pub channel: NotificationChannel,
    pub minutes_before: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntryNotificationSettings {
    pub enabled: bool,
    pub rules: Vec<CalendarEntryNotificationRule>,
}

impl Default for CalendarEntryNotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub time_zone: String,
    pub llm_provider: Option<String>,
    pub morning_overview_time_minutes: u16,
    pub calendar_entry_notification_settings: CalendarEntryNotificationSettings,
    /// 7-long, indexed by `weekday_index` (Monday = 0); `None` means no
    /// default template is configured for that weekday.
    pub template_defaults: [Option<String>; 7],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub settings: UserSettings,
    is_new: bool,
    #[serde(skip)]
    pending_events: Vec<PendingEvent>,
}

impl User {
    pub fn create(id: Uuid, settings: UserSettings) -> Self {
        let mut user = Self {
            id,
            settings,
            is_new: true,
            pending_events: Vec::new(),
        };
        user.record_event();
        user
    }

    pub fn from_persisted(id: Uuid, settings: UserSettings) -> Self {
        Self {
            id,
            settings,
            is_new: false,
            pending_events: Vec::new(),
        }
    }

    pub fn update_settings(&mut self, settings: UserSettings) {
        self.settings = settings;
        self.record_event();
    }

    fn record_event(&mut self) {
        let kind = if self.is_new {
            DomainEventKind::Created {
                entity_data: self.snapshot(),
            }
        } else {
            DomainEventKind::Updated {
                entity_data: self.snapshot(),
            }
        };
        self.pending_events
            .push(PendingEvent::new(EntityKind::User, self.id, kind));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).expect("User always serializes")
    }
}

impl Aggregate for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    fn drain_events(&mut self) -> Vec<PendingEvent> {
        self.is_new = false;
        std::mem::take(&mut self.pending_events)
    }
}
