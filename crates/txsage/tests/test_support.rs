#![cfg(test)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcp_client::protocol::{CallToolResult, Tool};
use serde_json::{json, Value};

use txsage::config::{Settings, StaticSettings};
use txsage::message::{Message, ModelReply};
use txsage::model::ModelConfig;
use txsage::providers::base::{Provider, ProviderUsage, Usage};
use txsage::providers::errors::ProviderError;
use txsage::providers::factory::ProviderFactory;
use txsage::tools::{ToolConnector, ToolDescriptor, ToolService, ToolServiceError};
use txsage::Assistant;

pub const ENDPOINT: &str = "http://localhost:8000/mcp";

/// One recorded `complete` call.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
}

/// Answers with scripted replies in order and records what it was sent.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ModelReply, ProviderError>>>,
    calls: Mutex<Vec<ModelCall>>,
    first_call_delay: Mutex<Option<Duration>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ModelReply, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
            first_call_delay: Mutex::new(None),
        })
    }

    /// Like [`ScriptedProvider::new`], but the first call sleeps before replying.
    pub fn slow_first(
        replies: Vec<Result<ModelReply, ProviderError>>,
        delay: Duration,
    ) -> Arc<Self> {
        let provider = Self::new(replies);
        *provider.first_call_delay.lock().unwrap() = Some(delay);
        provider
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(ModelReply::default().with_text(text))])
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn get_model_config(&self) -> ModelConfig {
        ModelConfig::new("mock-model".to_string())
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<(ModelReply, ProviderUsage), ProviderError> {
        self.calls.lock().unwrap().push(ModelCall {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });
        let delay = self.first_call_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::ExecutionError("no scripted reply".into())))?;
        Ok((
            reply,
            ProviderUsage::new(
                "mock-model".to_string(),
                Usage::new(Some(10), Some(5), Some(15)),
            ),
        ))
    }
}

/// Hands out the same scripted provider and counts how often it was asked to.
#[allow(dead_code)]
pub struct MockProviderFactory {
    pub provider: Arc<ScriptedProvider>,
    pub creates: AtomicUsize,
}

#[allow(dead_code)]
impl MockProviderFactory {
    pub fn new(provider: Arc<ScriptedProvider>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            creates: AtomicUsize::new(0),
        })
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl ProviderFactory for MockProviderFactory {
    fn create(&self, _settings: &Settings) -> Result<Arc<dyn Provider>, ProviderError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.provider.clone())
    }
}

/// An in-memory tool server.
#[derive(Default)]
pub struct MockToolServer {
    tools: Mutex<Vec<Tool>>,
    results: Mutex<HashMap<String, Result<CallToolResult, String>>>,
    calls: Mutex<Vec<(String, Value)>>,
    connects: AtomicUsize,
    fail_connect: bool,
}

#[allow(dead_code)]
impl MockToolServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            fail_connect: true,
            ..Default::default()
        })
    }

    pub fn add_tool(&self, name: &str, description: &str) {
        self.tools.lock().unwrap().push(Tool::new(
            name,
            description,
            json!({
                "type": "object",
                "properties": {"signature": {"type": "string"}},
                "required": ["signature"]
            }),
        ));
    }

    pub fn respond(&self, name: &str, payload: Value) {
        self.results.lock().unwrap().insert(
            name.to_string(),
            Ok(CallToolResult {
                content: vec![json!({"type": "text", "text": payload.to_string()})],
                structured_content: Some(payload),
                is_error: None,
            }),
        );
    }

    pub fn fail(&self, name: &str, message: &str) {
        self.results
            .lock()
            .unwrap()
            .insert(name.to_string(), Err(message.to_string()));
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolService for MockToolServer {
    async fn list_tools(&self) -> Result<Vec<Tool>, ToolServiceError> {
        Ok(self.tools.lock().unwrap().clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, ToolServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        match self.results.lock().unwrap().get(name) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(ToolServiceError::Client(mcp_client::Error::RpcError {
                code: -32603,
                message: message.clone(),
            })),
            None => Err(ToolServiceError::Client(mcp_client::Error::RpcError {
                code: -32602,
                message: format!("Unknown tool: {name}"),
            })),
        }
    }
}

/// `Arc<MockToolServer>` cannot implement the connector itself, so tests wrap it.
pub struct MockConnector(pub Arc<MockToolServer>);

#[async_trait]
impl ToolConnector for MockConnector {
    async fn connect(&self, _endpoint: &str) -> Result<Arc<dyn ToolService>, ToolServiceError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_connect {
            return Err(ToolServiceError::NotConnected);
        }
        Ok(self.0.clone())
    }
}

#[allow(dead_code)]
pub fn settings(api_key: Option<&str>, endpoint: Option<&str>) -> Settings {
    Settings {
        api_key: api_key.map(str::to_string),
        mcp_endpoint: endpoint.map(str::to_string),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn assistant(
    settings: Settings,
    provider: Arc<ScriptedProvider>,
    server: Arc<MockToolServer>,
) -> Arc<Assistant> {
    Arc::new(
        Assistant::builder()
            .settings_source(Arc::new(StaticSettings(settings)))
            .provider_factory(MockProviderFactory::new(provider))
            .connector(Arc::new(MockConnector(server)))
            .build()
            .unwrap(),
    )
}
