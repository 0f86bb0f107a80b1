use serde_json::Value;
use std::sync::Arc;

use super::ToolService;
use crate::message::ToolCallRequest;

/// What happened to one requested tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallOutcome {
    pub name: String,
    pub arguments: Value,
    /// The tool's payload, untouched, or a failure message.
    pub result: Result<Value, String>,
}

impl ToolCallOutcome {
    pub fn success<S: Into<String>>(name: S, arguments: Value, payload: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: Ok(payload),
        }
    }

    pub fn failure<S: Into<String>, E: Into<String>>(name: S, arguments: Value, error: E) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: Err(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs tool calls against a connected [`ToolService`].
///
/// Names and arguments go to the server exactly as the model produced them;
/// argument validation is left to the server.
#[derive(Clone)]
pub struct ToolInvoker {
    service: Arc<dyn ToolService>,
}

impl ToolInvoker {
    pub fn new(service: Arc<dyn ToolService>) -> Self {
        Self { service }
    }

    /// Invoke one call. Every failure, including a result flagged `isError`,
    /// comes back as a failure outcome.
    #[tracing::instrument(skip(self, request), fields(tool = %request.name))]
    pub async fn invoke(&self, request: &ToolCallRequest) -> ToolCallOutcome {
        let arguments = request.arguments.clone();
        match self
            .service
            .call_tool(&request.name, arguments.clone())
            .await
        {
            Ok(result) if result.is_error() => {
                let text = result.text();
                let message = if text.is_empty() {
                    "Tool reported an error without details".to_string()
                } else {
                    text
                };
                tracing::warn!(error = %message, "Tool call returned an error result");
                ToolCallOutcome::failure(&request.name, arguments, message)
            }
            Ok(result) => {
                let payload = match result.structured_content {
                    Some(structured) => structured,
                    None => Value::Array(result.content),
                };
                ToolCallOutcome::success(&request.name, arguments, payload)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tool call failed");
                ToolCallOutcome::failure(&request.name, arguments, e.to_string())
            }
        }
    }
}
