use mcp_client::protocol::Tool;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::invoker::ToolInvoker;
use super::{ToolConnector, ToolService, ToolServiceError};
use crate::providers::utils::is_valid_function_name;

/// Parameter schema of a tool, reduced to what the model needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolParameters {
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl ToolParameters {
    /// The parameters as a JSON schema object.
    pub fn to_schema(&self) -> Map<String, Value> {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert(
            "properties".to_string(),
            Value::Object(self.properties.clone()),
        );
        if !self.required.is_empty() {
            schema.insert("required".to_string(), json!(self.required));
        }
        schema
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

impl From<&Tool> for ToolDescriptor {
    /// Never fails: a missing description becomes `""` and a missing or
    /// malformed `properties`/`required` becomes empty.
    fn from(tool: &Tool) -> Self {
        let properties = tool
            .input_schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let required = tool
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: tool.name.clone(),
            description: tool.description.clone().unwrap_or_default(),
            parameters: ToolParameters {
                properties,
                required,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryState {
    Uninitialized,
    Connecting,
    Ready,
    Failed,
}

/// A snapshot of the registry for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStatus {
    pub state: RegistryState,
    pub endpoint: Option<String>,
    pub tool_count: usize,
    pub last_error: Option<String>,
}

struct Connection {
    endpoint: Option<String>,
    service: Option<Arc<dyn ToolService>>,
    tools: Vec<ToolDescriptor>,
}

/// Discovers and caches the tools of one tool server.
///
/// Discovery runs lazily on the first call to [`ToolRegistry::tools`] and its
/// result is kept until [`ToolRegistry::reload`] or an endpoint change. A failed
/// discovery leaves the registry `Failed` with no tools; it is only retried
/// through an explicit reload.
pub struct ToolRegistry {
    connector: Arc<dyn ToolConnector>,
    status: RwLock<RegistryStatus>,
    connection: Mutex<Connection>,
}

impl ToolRegistry {
    pub fn new(connector: Arc<dyn ToolConnector>, endpoint: Option<String>) -> Self {
        Self {
            connector,
            status: RwLock::new(RegistryStatus {
                state: RegistryState::Uninitialized,
                endpoint: endpoint.clone(),
                tool_count: 0,
                last_error: None,
            }),
            connection: Mutex::new(Connection {
                endpoint,
                service: None,
                tools: Vec::new(),
            }),
        }
    }

    pub async fn state(&self) -> RegistryState {
        self.status.read().await.state
    }

    pub async fn status(&self) -> RegistryStatus {
        self.status.read().await.clone()
    }

    /// The discovered tools, discovering them first if that was never attempted.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        let mut connection = self.connection.lock().await;
        if self.state().await == RegistryState::Uninitialized && connection.endpoint.is_some() {
            // failures are recorded in the status
            let _ = self.discover(&mut connection).await;
        }
        connection.tools.clone()
    }

    /// Tear down the connection and discover again from scratch.
    pub async fn reload(&self) -> Result<Vec<ToolDescriptor>, ToolServiceError> {
        let mut connection = self.connection.lock().await;
        self.teardown(&mut connection).await;
        if connection.endpoint.is_none() {
            return Ok(Vec::new());
        }
        self.discover(&mut connection).await?;
        Ok(connection.tools.clone())
    }

    /// Point the registry at a new endpoint. Returns whether it changed; a change
    /// drops the current connection and the next [`ToolRegistry::tools`] call
    /// discovers against the new endpoint.
    pub async fn configure(&self, endpoint: Option<String>) -> bool {
        let mut connection = self.connection.lock().await;
        if connection.endpoint == endpoint {
            return false;
        }
        tracing::info!(?endpoint, "Tool endpoint changed");
        self.teardown(&mut connection).await;
        connection.endpoint = endpoint.clone();
        self.status.write().await.endpoint = endpoint;
        true
    }

    /// An invoker bound to the live connection, when the registry is ready.
    pub async fn invoker(&self) -> Option<ToolInvoker> {
        let connection = self.connection.lock().await;
        connection.service.clone().map(ToolInvoker::new)
    }

    async fn teardown(&self, connection: &mut Connection) {
        if let Some(service) = connection.service.take() {
            service.shutdown().await;
        }
        connection.tools.clear();

        let mut status = self.status.write().await;
        status.state = RegistryState::Uninitialized;
        status.tool_count = 0;
        status.last_error = None;
    }

    #[tracing::instrument(skip(self, connection), fields(endpoint = ?connection.endpoint))]
    async fn discover(&self, connection: &mut Connection) -> Result<(), ToolServiceError> {
        let Some(endpoint) = connection.endpoint.clone() else {
            return Ok(());
        };
        self.status.write().await.state = RegistryState::Connecting;

        let result = match self.connector.connect(&endpoint).await {
            Ok(service) => match service.list_tools().await {
                Ok(tools) => Ok((service, tools)),
                Err(e) => {
                    service.shutdown().await;
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };

        let mut status = self.status.write().await;
        match result {
            Ok((service, tools)) => {
                connection.tools = descriptors(&tools);
                connection.service = Some(service);
                status.state = RegistryState::Ready;
                status.tool_count = connection.tools.len();
                status.last_error = None;
                tracing::info!(count = connection.tools.len(), "Discovered tools");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tool discovery failed, continuing without tools");
                status.state = RegistryState::Failed;
                status.tool_count = 0;
                status.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Convert a listing, skipping tools the model API could not declare.
fn descriptors(tools: &[Tool]) -> Vec<ToolDescriptor> {
    let mut seen = HashSet::new();
    tools
        .iter()
        .filter(|tool| {
            if !is_valid_function_name(&tool.name) {
                tracing::warn!(tool = %tool.name, "Skipping tool with an unsupported name");
                return false;
            }
            if !seen.insert(tool.name.clone()) {
                tracing::warn!(tool = %tool.name, "Skipping duplicate tool");
                return false;
            }
            true
        })
        .map(ToolDescriptor::from)
        .collect()
}
