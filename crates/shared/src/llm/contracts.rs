use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The LLM use cases this system runs (spec §4.5.3/§4.5.4/§4.5.6 and the
/// brain-dump supplement). Each one maps to exactly one tool the runner
/// offers the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistantCapability {
    SmartNotification,
    MorningOverview,
    KioskNotification,
    BrainDumpClassification,
    InboundSmsReply,
}

impl AssistantCapability {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SmartNotification => "smart_notification",
            Self::MorningOverview => "morning_overview",
            Self::KioskNotification => "kiosk_notification",
            Self::BrainDumpClassification => "brain_dump_classification",
            Self::InboundSmsReply => "inbound_sms_reply",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

/// Arguments for `decide_notification` (spec §4.5.3, reused verbatim by the
/// kiosk-notification use case per §4.5.6's "similar to smart").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DecideNotificationArgs {
    pub should_notify: bool,
    pub message: String,
    pub priority: NotificationPriority,
    pub reason: String,
}

/// Arguments for the morning-overview use case's single tool (spec §4.5.4):
/// the model composes one push-notification body from the ingested tasks,
/// calendar, and task-risk context.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerateOverviewArgs {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BrainDumpAction {
    CreateTask,
    Discard,
}

/// Arguments for the brain-dump classification use case (SPEC_FULL.md §3
/// supplement): classify raw free text into a new adhoc task or a discard.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClassifyBrainDumpArgs {
    pub action: BrainDumpAction,
    #[serde(default)]
    pub task_name: Option<String>,
    pub reason: String,
}

/// Arguments for the inbound-SMS-reply use case's single tool: decide
/// whether an inbound text warrants an automated reply, and what it says.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReplyToSmsArgs {
    pub should_reply: bool,
    #[serde(default)]
    pub reply_text: String,
    pub reason: String,
}
