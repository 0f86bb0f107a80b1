use serde::{Deserialize, Serialize};

/// Generation parameters sent with every model call of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    /// Sampling temperature in 0.0..=1.0, omitted from the request when unset
    pub temperature: Option<f32>,
    /// Output token cap (`maxOutputTokens`)
    pub max_tokens: Option<i32>,
}

impl ModelConfig {
    pub fn new(model_name: String) -> Self {
        Self {
            model_name,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature, clamped to the range the model API accepts
    pub fn with_temperature(mut self, temp: Option<f32>) -> Self {
        self.temperature = temp.map(|t| t.clamp(0.0, 1.0));
        self
    }

    pub fn with_max_tokens(mut self, tokens: Option<i32>) -> Self {
        self.max_tokens = tokens;
        self
    }
}
