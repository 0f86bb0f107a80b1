use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Response, StatusCode};
use serde_json::{from_value, Value};

use super::base::Usage;
use super::errors::{GoogleErrorResponse, ProviderError};
use crate::model::ModelConfig;

static VALID_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

/// Handle response from the Gemini API
/// Error codes: https://ai.google.dev/gemini-api/docs/troubleshooting#error-codes
pub async fn handle_response_google_compat(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let payload = match response.json::<Value>().await {
        Ok(json) => json,
        Err(e) if status.is_success() => {
            return Err(ProviderError::ResponseParseError(e.to_string()))
        }
        Err(_) => Value::Null,
    };

    match status {
        StatusCode::OK => Ok(payload),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ProviderError::Authentication(format!(
                "Authentication failed. Please ensure your API key is valid and has the required permissions. \
                Status: {}. Response: {:?}",
                status, payload
            )))
        }
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
            tracing::debug!(
                "Provider request failed with status: {}. Payload: {:?}",
                status,
                payload
            );
            if let Ok(err_resp) = from_value::<GoogleErrorResponse>(payload) {
                let err = err_resp.error;
                // Gemini reports an invalid key as a plain 400
                if err.status.as_deref() == Some("INVALID_ARGUMENT")
                    && err
                        .message
                        .as_deref()
                        .is_some_and(|m| m.contains("API key"))
                {
                    return Err(ProviderError::Authentication(err.to_string()));
                }
                if err.is_context_length_exceeded() {
                    return Err(ProviderError::ContextLengthExceeded(err.to_string()));
                }
                return Err(ProviderError::RequestFailed(format!(
                    "{} (status {})",
                    err,
                    status.as_u16()
                )));
            }
            Err(ProviderError::RequestFailed(format!(
                "Unknown error (status {})",
                status
            )))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Err(ProviderError::RateLimitExceeded(format!("{:?}", payload)))
        }
        s if s.is_server_error() => Err(ProviderError::ServerError(format!(
            "Status {}: {:?}",
            s.as_u16(),
            payload
        ))),
        _ => {
            tracing::debug!(
                "Provider request failed with status: {}. Payload: {:?}",
                status,
                payload
            );
            Err(ProviderError::RequestFailed(format!(
                "Request failed with status: {}",
                status
            )))
        }
    }
}

/// Gemini function names must match `[a-zA-Z0-9_-]+`.
pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

pub fn emit_debug_trace(
    model_config: &ModelConfig,
    payload: &Value,
    response: &Value,
    usage: &Usage,
) {
    tracing::debug!(
        model_config = %serde_json::to_string_pretty(model_config).unwrap_or_default(),
        input = %serde_json::to_string_pretty(payload).unwrap_or_default(),
        output = %serde_json::to_string_pretty(response).unwrap_or_default(),
        input_tokens = ?usage.input_tokens.unwrap_or_default(),
        output_tokens = ?usage.output_tokens.unwrap_or_default(),
        total_tokens = ?usage.total_tokens.unwrap_or_default(),
    );
}
