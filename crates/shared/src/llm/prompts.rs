use super::contracts::AssistantCapability;

/// The three templated prompt parts (spec §4.6); the fourth part,
/// `tools_prompt`, is reflected from the use case's `ToolSpec`s rather than
/// templated, so it lives alongside the runner instead of here.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub capability: AssistantCapability,
    pub system_prompt: String,
    pub context_prompt: String,
    pub ask_prompt: String,
}

pub fn template_for_capability(capability: AssistantCapability) -> PromptTemplate {
    match capability {
        AssistantCapability::SmartNotification => PromptTemplate {
            capability,
            system_prompt: "You are a notification gate for a personal planning assistant. \
                You decide whether the user should be interrupted right now, erring toward \
                silence unless something genuinely needs their attention."
                .to_string(),
            context_prompt: "The context payload describes the user's current day state: \
                tasks, calendar entries, and recent activity."
                .to_string(),
            ask_prompt: "Call decide_notification with should_notify, message, priority, \
                and reason. Only set should_notify=true for something time-sensitive or \
                overdue; default to should_notify=false."
                .to_string(),
        },
        AssistantCapability::MorningOverview => PromptTemplate {
            capability,
            system_prompt: "You are a morning briefing assistant for a personal planning \
                backend. You compose one concise overview of the day ahead."
                .to_string(),
            context_prompt: "The context payload contains today's tasks, calendar entries, \
                and the at-risk tasks flagged by the task-risk score."
                .to_string(),
            ask_prompt: "Call generate_overview with a single `message` field: a short, \
                friendly summary of the day's meetings, tasks, and any at-risk items."
                .to_string(),
        },
        AssistantCapability::KioskNotification => PromptTemplate {
            capability,
            system_prompt: "You are a notification gate for a kiosk display. You decide \
                whether to read a notification aloud right now, erring toward silence."
                .to_string(),
            context_prompt: "The context payload describes the user's current day state: \
                tasks, calendar entries, and recent activity."
                .to_string(),
            ask_prompt: "Call decide_notification with should_notify, message, priority, \
                and reason. Only set should_notify=true for something time-sensitive or \
                overdue; default to should_notify=false."
                .to_string(),
        },
        AssistantCapability::BrainDumpClassification => PromptTemplate {
            capability,
            system_prompt: "You classify a free-form note a user jotted down into either a \
                concrete task or nothing actionable."
                .to_string(),
            context_prompt: "The context payload contains the raw brain-dump text and the \
                date it was captured for.".to_string(),
            ask_prompt: "Call classify_brain_dump with action (create_task or discard), an \
                optional task_name when action is create_task, and a reason."
                .to_string(),
        },
        AssistantCapability::InboundSmsReply => PromptTemplate {
            capability,
            system_prompt: "You triage inbound text messages for a personal planning \
                assistant. Most texts don't need an automated reply; only answer when the \
                text asks a direct question this assistant can answer from the context given."
                .to_string(),
            context_prompt: "The context payload contains the inbound message body and a \
                short window of recent messages on this thread."
                .to_string(),
            ask_prompt: "Call reply_to_sms with should_reply, reply_text (required when \
                should_reply is true, otherwise empty), and a reason."
                .to_string(),
        },
    }
}
