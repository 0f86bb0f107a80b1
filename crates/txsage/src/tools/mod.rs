//! Remote tools served over MCP.
//!
//! [`ToolConnector`] opens a [`ToolService`] for an endpoint; the registry caches
//! what the service advertises and the invoker runs calls against it.

pub mod invoker;
pub mod registry;

pub use invoker::{ToolCallOutcome, ToolInvoker};
pub use registry::{RegistryState, ToolDescriptor, ToolParameters, ToolRegistry};

use async_trait::async_trait;
use mcp_client::client::{ClientCapabilities, ClientInfo, McpClient, McpClientTrait};
use mcp_client::protocol::{CallToolResult, Tool};
use mcp_client::transport::streamable_http::StreamableHttpTransportHandle;
use mcp_client::transport::{StreamableHttpTransport, Transport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Discovery and invocation failures. These never escape the answer engine.
#[derive(Debug, Error)]
pub enum ToolServiceError {
    #[error("Invalid tool endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Tool transport error: {0}")]
    Transport(#[from] mcp_client::transport::Error),

    #[error("Tool service error: {0}")]
    Client(#[from] mcp_client::Error),

    #[error("Tool service is not connected")]
    NotConnected,
}

/// A live connection to a tool server.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Every tool the server advertises, across all pages.
    async fn list_tools(&self) -> Result<Vec<Tool>, ToolServiceError>;

    async fn call_tool(&self, name: &str, arguments: Value)
        -> Result<CallToolResult, ToolServiceError>;

    /// Release the server-side session. Errors are logged, not returned.
    async fn shutdown(&self) {}
}

/// Opens tool service connections.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn ToolService>, ToolServiceError>;
}

/// Connects over MCP Streamable HTTP and completes the `initialize` handshake.
#[derive(Debug, Clone)]
pub struct McpConnector {
    client_info: ClientInfo,
}

impl Default for McpConnector {
    fn default() -> Self {
        Self {
            client_info: ClientInfo {
                name: "txsage".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    #[tracing::instrument(skip(self))]
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn ToolService>, ToolServiceError> {
        StreamableHttpTransport::validate_endpoint(endpoint)
            .map_err(|e| ToolServiceError::InvalidEndpoint(e.to_string()))?;

        let transport = StreamableHttpTransport::new(endpoint);
        let handle = transport.start().await?;
        let mut client = McpClient::connect(handle.clone(), REQUEST_TIMEOUT).await?;

        let info = match client
            .initialize(self.client_info.clone(), ClientCapabilities::default())
            .await
        {
            Ok(info) => info,
            Err(e) => {
                let _ = handle.close().await;
                return Err(e.into());
            }
        };
        tracing::info!(
            server = %info.server_info.name,
            version = %info.server_info.version,
            protocol = %info.protocol_version,
            "Connected to tool server"
        );

        Ok(Arc::new(McpToolService { client, handle }))
    }
}

struct McpToolService {
    client: McpClient<StreamableHttpTransportHandle>,
    handle: StreamableHttpTransportHandle,
}

#[async_trait]
impl ToolService for McpToolService {
    async fn list_tools(&self) -> Result<Vec<Tool>, ToolServiceError> {
        Ok(self.client.list_all_tools().await?)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, ToolServiceError> {
        Ok(self.client.call_tool(name, arguments).await?)
    }

    async fn shutdown(&self) {
        if let Err(e) = self.handle.close().await {
            tracing::warn!(error = %e, "Failed to terminate tool session");
        }
    }
}
