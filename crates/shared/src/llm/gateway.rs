use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::contracts::AssistantCapability;
use super::prompts::PromptTemplate;
use super::tool_spec::ToolSpec;

pub type LlmGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LlmGatewayResponse, LlmGatewayError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct LlmGatewayRequest {
    pub requester_id: Option<String>,
    pub capability: AssistantCapability,
    pub system_prompt: String,
    pub context_prompt: String,
    pub ask_prompt: String,
    pub tools: Vec<ToolSpec>,
    pub context_payload: Value,
}

impl LlmGatewayRequest {
    pub fn new(template: &PromptTemplate, tools: Vec<ToolSpec>, context_payload: Value) -> Self {
        Self {
            requester_id: None,
            capability: template.capability,
            system_prompt: template.system_prompt.clone(),
            context_prompt: template.context_prompt.clone(),
            ask_prompt: template.ask_prompt.clone(),
            tools,
            context_payload,
        }
    }

    pub fn with_requester_id(mut self, requester_id: impl AsRef<str>) -> Self {
        let trimmed = requester_id.as_ref().trim();
        if !trimmed.is_empty() {
            self.requester_id = Some(trimmed.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmTokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One tool invocation the model asked for, from the provider's native
/// function-calling channel (spec §4.6 step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallAttempt {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGatewayResponse {
    pub model: String,
    pub provider_request_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallAttempt>,
    #[serde(default)]
    pub text: Option<String>,
    pub usage: Option<LlmTokenUsage>,
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

pub trait LlmGateway: Send + Sync {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a>;
}
