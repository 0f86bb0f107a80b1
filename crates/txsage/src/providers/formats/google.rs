use anyhow::Result;
use rmcp::model::Role;
use serde_json::{json, Map, Value};

use crate::message::{ContentPart, Message, ModelReply};
use crate::model::ModelConfig;
use crate::providers::base::Usage;
use crate::providers::errors::ProviderError;
use crate::tools::ToolDescriptor;

/// Convert transcript turns to Gemini `contents`, skipping turns without text
pub fn format_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .filter(|message| !message.text.is_empty())
        .map(|message| {
            let role = if message.role == Role::User {
                "user"
            } else {
                "model"
            };
            json!({"role": role, "parts": [{"text": message.text}]})
        })
        .collect()
}

/// Convert tool descriptors to Gemini function declarations
pub fn format_tools(tools: &[ToolDescriptor]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            let mut declaration = Map::new();
            declaration.insert("name".to_string(), json!(tool.name));
            declaration.insert("description".to_string(), json!(tool.description));
            // Gemini rejects an object schema without properties
            if !tool.parameters.properties.is_empty() {
                declaration.insert(
                    "parameters".to_string(),
                    process_map(&tool.parameters.to_schema(), None),
                );
            }
            Value::Object(declaration)
        })
        .collect()
}

/// Get the accepted keys for a given parent key in the JSON schema.
fn get_accepted_keys(parent_key: Option<&str>) -> &'static [&'static str] {
    match parent_key {
        Some("properties") => &[
            "anyOf",
            "allOf",
            "type",
            "description",
            "nullable",
            "enum",
            "properties",
            "required",
            "items",
        ],
        Some("items") => &["type", "properties", "items", "required"],
        _ => &["type", "properties", "required", "anyOf", "allOf"],
    }
}

/// Drop the JSON schema keywords the Gemini API refuses (`format`, `default`,
/// `additionalProperties`, `$schema`, ...), recursing through properties and items.
fn process_map(map: &Map<String, Value>, parent_key: Option<&str>) -> Value {
    let accepted_keys = get_accepted_keys(parent_key);
    let filtered_map: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| accepted_keys.contains(&key.as_str()))
        .filter_map(|(key, value)| match key.as_str() {
            "properties" => value.as_object().map(|properties| {
                let processed: Map<String, Value> = properties
                    .iter()
                    .map(|(prop_key, prop_value)| match prop_value.as_object() {
                        Some(prop_obj) => {
                            (prop_key.clone(), process_map(prop_obj, Some("properties")))
                        }
                        None => (prop_key.clone(), prop_value.clone()),
                    })
                    .collect();
                (key.clone(), Value::Object(processed))
            }),
            "items" => value
                .as_object()
                .map(|nested| (key.clone(), process_map(nested, Some("items")))),
            _ => Some((key.clone(), value.clone())),
        })
        .collect();

    Value::Object(filtered_map)
}

/// Parse a `generateContent` response into a [`ModelReply`].
///
/// Only the first candidate is read. A response without candidates (for example
/// one blocked by safety filters) parses to an empty reply.
pub fn response_to_reply(response: &Value) -> Result<ModelReply, ProviderError> {
    let Some(candidate) = response
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|candidates| candidates.first())
    else {
        if let Some(reason) = response
            .pointer("/promptFeedback/blockReason")
            .and_then(|v| v.as_str())
        {
            tracing::warn!(reason, "Prompt was blocked by the model");
        }
        return Ok(ModelReply::default());
    };

    let parts = match candidate.pointer("/content/parts") {
        None | Some(Value::Null) => return Ok(ModelReply::default()),
        Some(Value::Array(parts)) => parts,
        Some(other) => {
            return Err(ProviderError::ResponseParseError(format!(
                "candidate parts must be an array, got {}",
                other
            )))
        }
    };

    let mut content = Vec::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
            content.push(ContentPart::text(text));
        } else if let Some(function_call) = part.get("functionCall") {
            let name = function_call
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ProviderError::ResponseParseError(
                        "functionCall part without a name".to_string(),
                    )
                })?;
            let arguments = match function_call.get("args") {
                Some(args @ Value::Object(_)) => args.clone(),
                _ => json!({}),
            };
            content.push(ContentPart::tool_call(name, arguments));
        }
    }
    Ok(ModelReply::new(content))
}

/// Extract usage information from a Gemini response
pub fn get_usage(data: &Value) -> Usage {
    let Some(usage_meta_data) = data.get("usageMetadata") else {
        tracing::debug!(
            "Failed to get usage data: {}",
            ProviderError::UsageError("No usage data found in response".to_string())
        );
        return Usage::default();
    };

    let count = |key: &str| {
        usage_meta_data
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as i32)
    };
    Usage::new(
        count("promptTokenCount"),
        count("candidatesTokenCount"),
        count("totalTokenCount"),
    )
}

/// Create a complete request payload for the `generateContent` endpoint
pub fn create_request(
    model_config: &ModelConfig,
    messages: &[Message],
    tools: &[ToolDescriptor],
) -> Result<Value> {
    let mut payload = Map::new();
    payload.insert("contents".to_string(), json!(format_messages(messages)));
    if !tools.is_empty() {
        payload.insert(
            "tools".to_string(),
            json!([{"functionDeclarations": format_tools(tools)}]),
        );
    }
    let mut generation_config = Map::new();
    if let Some(temp) = model_config.temperature {
        generation_config.insert("temperature".to_string(), json!(temp as f64));
    }
    if let Some(tokens) = model_config.max_tokens {
        generation_config.insert("maxOutputTokens".to_string(), json!(tokens));
    }
    if !generation_config.is_empty() {
        payload.insert("generationConfig".to_string(), json!(generation_config));
    }

    Ok(json!(payload))
}
