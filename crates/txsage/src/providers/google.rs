use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::base::{Provider, ProviderUsage};
use super::errors::ProviderError;
use super::formats::google::{create_request, get_usage, response_to_reply};
use super::utils::{emit_debug_trace, handle_response_google_compat};
use crate::message::{Message, ModelReply};
use crate::model::ModelConfig;
use crate::tools::ToolDescriptor;

pub const GOOGLE_API_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GOOGLE_API_KEY_HEADER: &str = "x-goog-api-key";

const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Gemini over the `generateContent` REST endpoint.
#[derive(Debug, serde::Serialize)]
pub struct GoogleProvider {
    #[serde(skip)]
    client: Client,
    host: String,
    model: ModelConfig,
}

impl GoogleProvider {
    pub fn new(host: &str, api_key: &str, model: ModelConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key).map_err(|e| {
            ProviderError::Authentication(format!("API key is not a valid header value: {e}"))
        })?;
        key.set_sensitive(true);
        headers.insert(GOOGLE_API_KEY_HEADER, key);

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            host: host.to_string(),
            model,
        })
    }

    fn endpoint(&self) -> Result<Url, ProviderError> {
        let base_url = Url::parse(&self.host)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid base URL: {e}")))?;

        base_url
            .join(&format!(
                "v1beta/models/{}:generateContent",
                self.model.model_name
            ))
            .map_err(|e| {
                ProviderError::RequestFailed(format!("Failed to construct endpoint URL: {e}"))
            })
    }

    async fn post(&self, payload: &Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(self.endpoint()?)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Request failed: {e}")))?;

        handle_response_google_compat(response).await
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn get_model_config(&self) -> ModelConfig {
        self.model.clone()
    }

    #[tracing::instrument(
        skip(self, messages, tools),
        fields(model = %self.model.model_name, turns = messages.len(), tools = tools.len())
    )]
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<(ModelReply, ProviderUsage), ProviderError> {
        let payload = create_request(&self.model, messages, tools)?;

        let response = self.post(&payload).await?;

        let reply = response_to_reply(&response)?;
        let usage = get_usage(&response);
        let model = match response.get("modelVersion").and_then(|v| v.as_str()) {
            Some(model_version) => model_version.to_string(),
            None => self.model.model_name.clone(),
        };
        emit_debug_trace(&self.model, &payload, &response, &usage);
        Ok((reply, ProviderUsage::new(model, usage)))
    }
}
