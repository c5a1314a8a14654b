use schemars::JsonSchema;
use schemars::schema_for;
use serde_json::Value;

/// One parameter of a reflected tool, surfaced for prompt rendering and
/// logging — the actual validation source of truth is `ToolSpec::schema`.
#[derive(Debug, Clone)]
pub struct ToolParam {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

/// A callable the LLM runner offers to the model (spec §4.6): name,
/// human description, and a JSON schema derived by reflection from the
/// tool's argument struct via `schemars::schema_for!`.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ToolParam>,
    pub schema: Value,
}

impl ToolSpec {
    pub fn new<T: JsonSchema>(name: &'static str, description: &'static str) -> Self {
        let schema = serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null);
        let parameters = tool_params_from_schema(&schema);
        Self {
            name,
            description,
            parameters,
            schema,
        }
    }
}

fn tool_params_from_schema(schema: &Value) -> Vec<ToolParam> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, value)| ToolParam {
            name: name.clone(),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            required: required.contains(name),
        })
        .collect()
}
