use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::ProviderError;
use crate::message::{Message, ModelReply};
use crate::model::ModelConfig;
use crate::tools::ToolDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

impl std::ops::Add for Usage {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        fn sum(a: Option<i32>, b: Option<i32>) -> Option<i32> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a + b),
                (a, b) => a.or(b),
            }
        }
        Self::new(
            sum(self.input_tokens, other.input_tokens),
            sum(self.output_tokens, other.output_tokens),
            sum(self.total_tokens, other.total_tokens),
        )
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub model: String,
    pub usage: Usage,
}

impl ProviderUsage {
    pub fn new(model: String, usage: Usage) -> Self {
        Self { model, usage }
    }
}

/// A language model that can answer with text and tool call requests.
#[async_trait]
pub trait Provider: Send + Sync {
    fn get_model_config(&self) -> ModelConfig;

    /// Run one model call.
    ///
    /// # Arguments
    /// * `messages` - Alternating user/assistant turns, the last one being the prompt
    /// * `tools` - Tool declarations the model may request calls for, possibly empty
    ///
    /// # Errors
    /// Any transport or remote failure as a [`ProviderError`]. Providers never retry.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<(ModelReply, ProviderUsage), ProviderError>;
}
