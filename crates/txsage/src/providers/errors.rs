use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Usage data error: {0}")]
    UsageError(String),

    #[error("Invalid response: {0}")]
    ResponseParseError(String),
}

impl From<anyhow::Error> for ProviderError {
    fn from(error: anyhow::Error) -> Self {
        ProviderError::ExecutionError(error.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::ExecutionError(error.to_string())
    }
}

/// Error body returned by the Gemini API, e.g.
/// `{"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT"}}`
#[derive(serde::Deserialize, Debug)]
pub struct GoogleErrorResponse {
    pub error: GoogleError,
}

#[derive(serde::Deserialize, Debug)]
pub struct GoogleError {
    pub code: Option<u16>,
    pub message: Option<String>,
    pub status: Option<String>,
}

impl GoogleError {
    pub fn is_context_length_exceeded(&self) -> bool {
        self.message
            .as_deref()
            .is_some_and(|m| m.contains("exceeds the maximum number of tokens"))
    }
}

impl std::fmt::Display for GoogleError {
    /// "API key not valid (status: INVALID_ARGUMENT)", or just the message.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message.as_deref().unwrap_or("Unknown error"))?;
        if let Some(status) = &self.status {
            write!(f, " (status: {})", status)?;
        }
        Ok(())
    }
}
