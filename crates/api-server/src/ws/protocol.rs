//! Wire protocol for the `/days/today/context` endpoint (spec §6.1).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use shared::queries::{Change, DayContext};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerMessage {
    ConnectionAck {
        user_id: Uuid,
    },
    SyncResponse {
        day_context: Option<DayContext>,
        changes: Option<Vec<Change>>,
        last_audit_log_timestamp: DateTime<Utc>,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub(crate) fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub(crate) fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","code":"serialize_failed","message":"failed to serialize response"}"#
                .to_string()
        })
    }
}

/// Parses an inbound client frame (spec §6.1). Unknown `type` values and
/// malformed `since_timestamp` fields are surfaced as `None` so the caller
/// can respond with `{type: "error", ...}` instead of dropping the
/// connection, matching §4.8 step 3's "Unknown type ⇒ respond error" rule.
pub(crate) fn parse_sync_request(text: &str) -> Result<Option<DateTime<Utc>>, String> {
    let value: Value = serde_json::from_str(text).map_err(|err| err.to_string())?;

    let message_type = value.get("type").and_then(Value::as_str);
    if message_type != Some("sync_request") {
        return Err(format!("unknown message type {message_type:?}"));
    }

    match value.get("since_timestamp") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|err| err.to_string()),
        Some(_) => Err("since_timestamp must be a string or null".to_string()),
    }
}
