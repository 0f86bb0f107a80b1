//! Conversation turns and model replies.
//!
//! A [`Message`] is a transcript turn and only ever carries user-visible text.
//! Tool calls live on [`ModelReply`], which is what a provider hands back for a
//! single model call and is never stored in a transcript.

use chrono::Utc;
use rmcp::model::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One transcript turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub text: String,
}

impl Message {
    pub fn new<S: Into<String>>(role: Role, text: S) -> Self {
        Self {
            role,
            created: Utc::now().timestamp_millis(),
            text: text.into(),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, text)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ContentPart {
    Text { text: String },
    ToolCall(ToolCallRequest),
}

impl ContentPart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn tool_call<S: Into<String>>(name: S, arguments: Value) -> Self {
        ContentPart::ToolCall(ToolCallRequest::new(name, arguments))
    }
}

/// The parsed result of one model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub parts: Vec<ContentPart>,
}

impl ModelReply {
    pub fn new(parts: Vec<ContentPart>) -> Self {
        Self { parts }
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.parts.push(ContentPart::text(text));
        self
    }

    pub fn with_tool_call<S: Into<String>>(mut self, name: S, arguments: Value) -> Self {
        self.parts.push(ContentPart::tool_call(name, arguments));
        self
    }

    /// All text parts joined together, or `None` when there is no non-empty text.
    pub fn text(&self) -> Option<String> {
        let text = self
            .parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ToolCall(_) => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn tool_calls(&self) -> Vec<ToolCallRequest> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(request) => Some(request.clone()),
                ContentPart::Text { .. } => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, ContentPart::ToolCall(_)))
    }
}
