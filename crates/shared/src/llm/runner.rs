use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::gateway::{LlmGateway, LlmGatewayRequest, LlmGatewayResponse, ToolCallAttempt};
use super::observability::{LlmExecutionSource, LlmTelemetryEvent, generate_with_telemetry};
use super::prompts::PromptTemplate;
use super::safety::sanitize_context_payload;
use super::tool_spec::ToolSpec;
use super::validation::validate_tool_arguments;
use crate::domain::llm_run_result::{LlmRunResultSnapshot, ToolCallRecord};

pub type ToolInvokeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool callback failed: {0}")]
    Failed(String),
}

/// One LLM-backed reactive use case (spec §4.6). Each implementor exposes
/// exactly one tool today (`decide_notification`, `generate_overview`, or
/// `classify_brain_dump`), but the runner doesn't assume that cardinality.
pub trait LlmUseCase: Send + Sync {
    fn prompt_template(&self) -> PromptTemplate;
    fn tools(&self) -> Vec<ToolSpec>;
    fn invoke_tool<'a>(&'a self, name: &str, arguments: Value) -> ToolInvokeFuture<'a>;
}

#[derive(Debug, Error)]
pub enum LlmRunError {
    #[error("llm gateway call failed: {0}")]
    Gateway(String),
}

/// Runs one LLM use case end to end (spec §4.6): assemble prompts, sanitize
/// context, call the gateway, extract and validate tool calls, invoke the
/// matching callbacks, and assemble the resulting snapshot. Synchronous
/// from the caller's point of view — it never backgrounds work.
pub async fn run_use_case(
    gateway: &dyn LlmGateway,
    source: LlmExecutionSource,
    use_case: &dyn LlmUseCase,
    context_payload: Value,
    referenced_entity_ids: Vec<Uuid>,
    requester_id: Option<&str>,
) -> Result<LlmRunResultSnapshot, LlmRunError> {
    let template = use_case.prompt_template();
    let tools = use_case.tools();
    let sanitized_context = sanitize_context_payload(&context_payload);
    let tools_prompt = render_tools_prompt(&tools);

    let mut request = LlmGatewayRequest::new(&template, tools.clone(), sanitized_context.clone());
    if let Some(requester_id) = requester_id {
        request = request.with_requester_id(requester_id);
    }

    let started_at = Instant::now();
    let (result, telemetry) = generate_with_telemetry(gateway, source, request).await;
    log_telemetry(&telemetry);

    let response = result.map_err(|err| LlmRunError::Gateway(err.to_string()))?;
    let attempts = extract_tool_call_attempts(&response, &tools);

    let mut tool_calls = Vec::new();
    for attempt in attempts {
        let Some(tool) = tools.iter().find(|tool| tool.name == attempt.name) else {
            warn!(tool_name = attempt.name.as_str(), "llm requested an unknown tool");
            continue;
        };

        if let Err(err) = validate_tool_arguments(tool, &attempt.arguments) {
            warn!(tool_name = tool.name, error = %err, "llm tool call failed schema validation");
            continue;
        }

        let invoked = use_case
            .invoke_tool(tool.name, attempt.arguments.clone())
            .await;
        match invoked {
            Ok(result) => tool_calls.push(ToolCallRecord {
                tool_name: tool.name.to_string(),
                arguments: attempt.arguments,
                result,
            }),
            Err(err) => {
                warn!(tool_name = tool.name, error = %err, "llm tool callback failed");
            }
        }
    }

    info!(
        capability = template.capability.as_str(),
        tool_call_count = tool_calls.len(),
        elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        "llm use case run complete"
    );

    Ok(LlmRunResultSnapshot {
        tool_calls,
        serialized_context: sanitized_context,
        current_time: Utc::now(),
        provider: response.model,
        system_prompt: template.system_prompt,
        context_prompt: template.context_prompt,
        ask_prompt: template.ask_prompt,
        tools_prompt,
        referenced_entity_ids,
    })
}

fn log_telemetry(telemetry: &LlmTelemetryEvent) {
    info!(
        source = telemetry.source,
        capability = telemetry.capability,
        outcome = telemetry.outcome,
        provider = telemetry.provider.as_str(),
        model = ?telemetry.model,
        latency_ms = telemetry.latency_ms,
        prompt_tokens = ?telemetry.prompt_tokens,
        completion_tokens = ?telemetry.completion_tokens,
        total_tokens = ?telemetry.total_tokens,
        estimated_cost_usd = ?telemetry.estimated_cost_usd,
        error_type = ?telemetry.error_type,
        "llm gateway request metrics"
    );
}

fn render_tools_prompt(tools: &[ToolSpec]) -> String {
    tools
        .iter()
        .map(|tool| {
            let params = tool
                .parameters
                .iter()
                .map(|param| {
                    if param.required {
                        format!("{} (required)", param.name)
                    } else {
                        param.name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({}): {}", tool.name, params, tool.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tool-call extraction (spec §4.6 step 1): prefer the provider's native
/// channel; fall back to parsing the free-text response as JSON, supporting
/// fenced code blocks. A fallback payload that isn't already shaped like a
/// tool call (`{"name": ..., "arguments": {...}}`) is treated as the
/// arguments for the use case's sole tool, since every use case today
/// offers exactly one.
fn extract_tool_call_attempts(
    response: &LlmGatewayResponse,
    tools: &[ToolSpec],
) -> Vec<ToolCallAttempt> {
    if !response.tool_calls.is_empty() {
        return response.tool_calls.clone();
    }

    let Some(text) = response.text.as_deref() else {
        return Vec::new();
    };

    let Some(parsed) = parse_json_from_text(text) else {
        return Vec::new();
    };

    match parsed {
        Value::Array(entries) => entries
            .into_iter()
            .filter_map(|entry| tool_call_attempt_from_value(entry, tools))
            .collect(),
        other => tool_call_attempt_from_value(other, tools)
            .into_iter()
            .collect(),
    }
}

fn tool_call_attempt_from_value(value: Value, tools: &[ToolSpec]) -> Option<ToolCallAttempt> {
    if let Value::Object(entries) = &value
        && let Some(name) = entries
            .get("name")
            .or_else(|| entries.get("tool_name"))
            .and_then(Value::as_str)
    {
        let arguments = entries
            .get("arguments")
            .or_else(|| entries.get("args"))
            .cloned()
            .unwrap_or(Value::Null);
        return Some(ToolCallAttempt {
            name: name.to_string(),
            arguments,
        });
    }

    let [tool] = tools else {
        return None;
    };
    Some(ToolCallAttempt {
        name: tool.name.to_string(),
        arguments: value,
    })
}

fn parse_json_from_text(text: &str) -> Option<Value> {
    let candidate = extract_fenced_block(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str(&candidate).ok()
}

fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_opening = &text[start + 3..];
    let after_opening = after_opening
        .strip_prefix("json")
        .or_else(|| after_opening.strip_prefix("JSON"))
        .unwrap_or(after_opening);
    let end = after_opening.find("```")?;
    Some(after_opening[..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_tool() -> ToolSpec {
        ToolSpec::new::<crate::llm::contracts::GenerateOverviewArgs>(
            "generate_overview",
            "generate",
        )
    }

    #[test]
    fn extract_prefers_native_tool_calls() {
        let response = LlmGatewayResponse {
            model: "test-model".to_string(),
            provider_request_id: None,
            tool_calls: vec![ToolCallAttempt {
                name: "generate_overview".to_string(),
                arguments: json!({ "message": "hi" }),
            }],
            text: Some("ignored".to_string()),
            usage: None,
        };

        let attempts = extract_tool_call_attempts(&response, &[sample_tool()]);
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].name, "generate_overview");
    }

    #[test]
    fn extract_falls_back_to_fenced_json_text() {
        let response = LlmGatewayResponse {
            model: "test-model".to_string(),
            provider_request_id: None,
            tool_calls: Vec::new(),
            text: Some("here you go\n```json\n{\"message\": \"hi\"}\n```".to_string()),
            usage: None,
        };

        let tools = vec![sample_tool()];
        let attempts = extract_tool_call_attempts(&response, &tools);
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].name, "generate_overview");
        assert_eq!(attempts[0].arguments, json!({ "message": "hi" }));
    }

    #[test]
    fn extract_returns_nothing_without_native_or_text() {
        let response = LlmGatewayResponse {
            model: "test-model".to_string(),
            provider_request_id: None,
            tool_calls: Vec::new(),
            text: None,
            usage: None,
        };

        assert!(extract_tool_call_attempts(&response, &[sample_tool()]).is_empty());
    }
}
