//! The operations a UI layer can request, as plain serializable data.

use rmcp::model::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assistant::Diagnostics;
use crate::engine::{Exchange, ReplyContent};
use crate::errors::AssistantError;
use crate::message::Message;
use crate::providers::base::Usage;
use crate::tools::{RegistryState, ToolCallOutcome, ToolDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    Summarize,
    Chat {
        question: String,
        /// Replaces the session transcript before the question is asked.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history: Option<Vec<Turn>>,
    },
    ReloadSettings,
    ReloadTools,
    Diagnostics,
}

/// One prior turn supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn into_message(self) -> Message {
        Message::new(self.role, self.text)
    }
}

impl From<&Message> for Turn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.clone(),
            text: message.text.clone(),
        }
    }
}

/// A tool call as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallReport {
    pub name: String,
    pub arguments: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ToolCallOutcome> for ToolCallReport {
    fn from(outcome: ToolCallOutcome) -> Self {
        let (ok, payload, error) = match outcome.result {
            Ok(payload) => (true, Some(payload), None),
            Err(error) => (false, None, Some(error)),
        };
        Self {
            name: outcome.name,
            arguments: outcome.arguments,
            ok,
            payload,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub content: ReplyContent,
    pub tool_calls: Vec<ToolCallReport>,
    pub usage: Usage,
}

impl Reply {
    pub fn text(&self) -> Option<&str> {
        self.content.text()
    }
}

impl From<Exchange> for Reply {
    fn from(exchange: Exchange) -> Self {
        Self {
            content: exchange.content,
            tool_calls: exchange
                .tool_calls
                .into_iter()
                .map(ToolCallReport::from)
                .collect(),
            usage: exchange.usage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandResponse {
    Reply(Reply),
    Tools {
        state: RegistryState,
        tools: Vec<ToolDescriptor>,
    },
    SettingsReloaded(Diagnostics),
    Diagnostics(Diagnostics),
    Error {
        message: String,
    },
}

impl CommandResponse {
    pub fn error(err: AssistantError) -> Self {
        CommandResponse::Error {
            message: err.to_string(),
        }
    }
}

impl From<Result<Reply, AssistantError>> for CommandResponse {
    fn from(result: Result<Reply, AssistantError>) -> Self {
        match result {
            Ok(reply) => CommandResponse::Reply(reply),
            Err(e) => CommandResponse::error(e),
        }
    }
}
