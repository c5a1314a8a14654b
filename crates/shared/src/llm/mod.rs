pub mod contracts;
pub mod gateway;
pub mod observability;
pub mod openrouter;
pub mod prompts;
pub mod reliability;
pub mod runner;
pub mod safety;
pub mod tool_spec;
pub mod validation;

pub use contracts::{
    AssistantCapability, BrainDumpAction, ClassifyBrainDumpArgs, DecideNotificationArgs,
    GenerateOverviewArgs, NotificationPriority, ReplyToSmsArgs,
};
pub use gateway::{
    LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmGatewayResponse, LlmTokenUsage,
    ToolCallAttempt,
};
pub use observability::{LlmExecutionSource, LlmTelemetryEvent, generate_with_telemetry};
pub use openrouter::{
    OpenRouterConfigError, OpenRouterGateway, OpenRouterGatewayConfig, OpenRouterModelRoute,
};
pub use prompts::{PromptTemplate, template_for_capability};
pub use reliability::{
    LlmReliabilityConfig, LlmReliabilityConfigError, ReliableGatewayBuildError,
    ReliableOpenRouterGateway,
};
pub use runner::{LlmRunError, LlmUseCase, ToolError, run_use_case};
pub use safety::{sanitize_context_payload, sanitize_untrusted_text};
pub use tool_spec::{ToolParam, ToolSpec};
pub use validation::{ToolValidationError, validate_tool_arguments};
