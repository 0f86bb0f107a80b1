use thiserror::Error;

use crate::config::ConfigError;
use crate::providers::errors::ProviderError;

/// The failures a caller of the assistant can see.
///
/// Tool problems are not here: they are folded into the follow-up prompt as
/// failure notes and never abort an exchange.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model call failed: {0}")]
    ModelCall(#[from] ProviderError),

    #[error("Prompt rendering failed: {0}")]
    Prompt(#[from] minijinja::Error),
}

impl From<ConfigError> for AssistantError {
    fn from(err: ConfigError) -> Self {
        AssistantError::Configuration(err.to_string())
    }
}

impl AssistantError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, AssistantError::Configuration(_))
    }
}
