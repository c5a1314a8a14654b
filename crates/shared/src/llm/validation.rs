use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;

use super::tool_spec::ToolSpec;

#[derive(Debug, Error)]
pub enum ToolValidationError {
    #[error("tool schema for {name} failed to compile: {message}")]
    SchemaCompile { name: String, message: String },
    #[error("tool call arguments for {name} failed schema validation: {errors:?}")]
    SchemaViolation { name: String, errors: Vec<String> },
}

/// Validates a tool call's arguments against the schema reflected for that
/// tool (spec §4.6 step 2). Schemas are small and compiled per call rather
/// than cached, since this only runs once per reactive-handler tick.
pub fn validate_tool_arguments(
    tool: &ToolSpec,
    arguments: &Value,
) -> Result<(), ToolValidationError> {
    let compiled = JSONSchema::compile(&tool.schema).map_err(|err| ToolValidationError::SchemaCompile {
        name: tool.name.to_string(),
        message: err.to_string(),
    })?;

    if let Err(validation_errors) = compiled.validate(arguments) {
        let errors = validation_errors.map(|err| err.to_string()).collect::<Vec<_>>();
        return Err(ToolValidationError::SchemaViolation {
            name: tool.name.to_string(),
            errors,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::validate_tool_arguments;
    use crate::llm::contracts::DecideNotificationArgs;
    use crate::llm::tool_spec::ToolSpec;

    #[test]
    fn validate_tool_arguments_accepts_well_formed_call() {
        let tool = ToolSpec::new::<DecideNotificationArgs>("decide_notification", "decide");
        let arguments = json!({
            "should_notify": true,
            "message": "Meeting starts in 10 minutes",
            "priority": "high",
            "reason": "upcoming meeting"
        });

        assert!(validate_tool_arguments(&tool, &arguments).is_ok());
    }

    #[test]
    fn validate_tool_arguments_rejects_missing_field() {
        let tool = ToolSpec::new::<DecideNotificationArgs>("decide_notification", "decide");
        let arguments = json!({
            "should_notify": true,
            "message": "Meeting starts in 10 minutes"
        });

        assert!(validate_tool_arguments(&tool, &arguments).is_err());
    }
}
