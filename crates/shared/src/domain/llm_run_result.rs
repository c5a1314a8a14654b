use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One invocation of an LLM tool, as executed by the runner (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: Value,
    pub result: Value,
}

/// Captured per LLM use-case run for reproducibility (spec §3.1). Stored on
/// whatever entity the use case is "about" — a Message, PushNotification,
/// or BrainDumpItem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRunResultSnapshot {
    pub tool_calls: Vec<ToolCallRecord>,
    pub serialized_context: Value,
    pub current_time: DateTime<Utc>,
    pub provider: String,
    pub system_prompt: String,
    pub context_prompt: String,
    pub ask_prompt: String,
    pub tools_prompt: String,
    pub referenced_entity_ids: Vec<Uuid>,
}
