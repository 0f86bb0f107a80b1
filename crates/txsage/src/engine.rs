//! The question-answering exchange.
//!
//! ```text
//! Drafting ──no tool calls──▶ Done
//!    │
//!    └─tool calls─▶ ToolPending ─▶ Finalizing ─▶ Done
//! ```
//!
//! Drafting sends the transcript plus the prompt. If the model asks for tools,
//! every call runs in request order and the outcomes are folded into a fresh
//! single-turn follow-up prompt. Tool calls requested by the follow-up are not
//! executed: there is exactly one tool round per exchange.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::AssistantError;
use crate::message::{Message, ModelReply, ToolCallRequest};
use crate::prompt::{Language, PromptBuilder};
use crate::providers::base::{Provider, Usage};
use crate::tools::{ToolCallOutcome, ToolInvoker, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    Drafting,
    ToolPending,
    Finalizing,
    Done,
}

/// The final answer of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum ReplyContent {
    Text(String),
    /// The model answered without any text.
    NoContent,
}

impl ReplyContent {
    fn from_reply(reply: &ModelReply) -> Self {
        match reply.text() {
            Some(text) => ReplyContent::Text(text),
            None => ReplyContent::NoContent,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ReplyContent::Text(text) => Some(text),
            ReplyContent::NoContent => None,
        }
    }
}

/// Everything one exchange produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub content: ReplyContent,
    pub tool_calls: Vec<ToolCallOutcome>,
    pub usage: Usage,
    pub model_calls: usize,
}

pub struct AnswerEngine {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    prompts: Arc<PromptBuilder>,
}

impl AnswerEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        prompts: Arc<PromptBuilder>,
    ) -> Self {
        Self {
            provider,
            registry,
            prompts,
        }
    }

    /// Answer `prompt` given the prior `transcript`.
    ///
    /// Fails only when a model call fails or the follow-up prompt cannot be
    /// rendered; the caller must not commit anything to its transcript then.
    #[tracing::instrument(skip_all, fields(language = %language, turns = transcript.len()))]
    pub async fn run(
        &self,
        language: Language,
        transcript: &[Message],
        prompt: &str,
    ) -> Result<Exchange, AssistantError> {
        let tools = self.registry.tools().await;
        let mut state = ExchangeState::Drafting;
        tracing::debug!(?state, tools = tools.len(), "Starting exchange");

        let mut messages = transcript.to_vec();
        messages.push(Message::user(prompt));
        let (draft, draft_usage) = self.provider.complete(&messages, &tools).await?;
        let mut usage = draft_usage.usage;

        let requests = draft.tool_calls();
        if requests.is_empty() {
            state = ExchangeState::Done;
            tracing::debug!(?state, model_calls = 1, "Exchange finished without tools");
            return Ok(Exchange {
                content: ReplyContent::from_reply(&draft),
                tool_calls: Vec::new(),
                usage,
                model_calls: 1,
            });
        }

        state = ExchangeState::ToolPending;
        tracing::debug!(?state, requests = requests.len(), "Model requested tools");
        let outcomes = self.invoke_all(&requests).await;

        state = ExchangeState::Finalizing;
        let follow_up = self.prompts.tool_results(language, prompt, &outcomes)?;
        tracing::debug!(?state, failures = outcomes.iter().filter(|o| !o.is_success()).count());
        let (last, last_usage) = self
            .provider
            .complete(&[Message::user(follow_up)], &tools)
            .await?;
        usage += last_usage.usage;

        if last.has_tool_calls() {
            let ignored: Vec<String> = last.tool_calls().into_iter().map(|r| r.name).collect();
            tracing::warn!(?ignored, "Ignoring tool calls requested after the tool round");
        }

        state = ExchangeState::Done;
        tracing::debug!(?state, model_calls = 2, "Exchange finished");
        Ok(Exchange {
            content: ReplyContent::from_reply(&last),
            tool_calls: outcomes,
            usage,
            model_calls: 2,
        })
    }

    /// Run every request one after the other. A failure never stops the rest.
    async fn invoke_all(&self, requests: &[ToolCallRequest]) -> Vec<ToolCallOutcome> {
        let invoker: Option<ToolInvoker> = self.registry.invoker().await;
        let mut outcomes = Vec::with_capacity(requests.len());

        for request in requests {
            let outcome = match &invoker {
                Some(invoker) => invoker.invoke(request).await,
                None => {
                    tracing::warn!(
                        tool = %request.name,
                        "Tool requested but the tool service is not ready"
                    );
                    ToolCallOutcome::failure(
                        &request.name,
                        request.arguments.clone(),
                        "The tool service is not available",
                    )
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}
