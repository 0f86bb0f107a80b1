use rmcp::model::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcVersion2_0, Notification, NumberOrString, Request, RequestId,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower::{timeout::TimeoutLayer, Layer, Service, ServiceExt};

use crate::protocol::{
    CallToolResult, Implementation, InitializeResult, ListToolsResult, ServerCapabilities,
    LATEST_PROTOCOL_VERSION,
};
use crate::{McpService, TransportHandle};

pub type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// JSON-RPC code for a method the server does not implement.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Error type for MCP client operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] super::transport::Error),

    #[error("RPC error: code={code}, message={message}")]
    RpcError { code: i32, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected response from server: {0}")]
    UnexpectedResponse(String),

    #[error("Not initialized")]
    NotInitialized,

    #[error("Timeout or service not ready")]
    NotReady,

    #[error("Call to '{server}' failed for '{method}'. {source}")]
    McpServerError {
        method: String,
        server: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientCapabilities {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    protocol_version: String,
    capabilities: ClientCapabilities,
    client_info: ClientInfo,
}

#[async_trait::async_trait]
pub trait McpClientTrait: Send + Sync {
    async fn initialize(
        &mut self,
        info: ClientInfo,
        capabilities: ClientCapabilities,
    ) -> Result<InitializeResult, Error>;

    async fn list_tools(&self, next_cursor: Option<String>) -> Result<ListToolsResult, Error>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, Error>;
}

/// Client for the tool-serving side of the Model Context Protocol.
pub struct McpClient<T>
where
    T: TransportHandle + Send + Sync + 'static,
{
    service: Mutex<tower::timeout::Timeout<McpService<T>>>,
    next_id_counter: AtomicU32,
    server_capabilities: Option<ServerCapabilities>,
    server_info: Option<Implementation>,
    receive_loop: JoinHandle<()>,
}

impl<T> McpClient<T>
where
    T: TransportHandle + Send + Sync + 'static,
{
    /// Wrap a started transport and spawn the loop that routes responses back to callers.
    pub async fn connect(transport: T, timeout: std::time::Duration) -> Result<Self, Error> {
        let service = McpService::new(transport.clone());
        let service_ptr = service.clone();

        let receive_loop = tokio::spawn(async move {
            loop {
                match transport.receive().await {
                    Ok(message) => {
                        tracing::debug!("Received message: {:?}", message);
                        match message {
                            JsonRpcMessage::Response(JsonRpcResponse {
                                id: NumberOrString::Number(id),
                                ..
                            })
                            | JsonRpcMessage::Error(JsonRpcError {
                                id: NumberOrString::Number(id),
                                ..
                            }) => {
                                service_ptr.respond(&id.to_string(), Ok(message)).await;
                            }
                            other => {
                                tracing::debug!("Ignoring server-initiated message: {:?}", other);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Transport receive loop ended");
                        service_ptr.hangup().await;
                        break;
                    }
                }
            }
        });

        Ok(Self {
            service: Mutex::new(TimeoutLayer::new(timeout).layer(service)),
            next_id_counter: AtomicU32::new(1),
            server_capabilities: None,
            server_info: None,
            receive_loop,
        })
    }

    fn server_name(&self) -> String {
        self.server_info
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    fn params_object(params: Value) -> Result<Map<String, Value>, Error> {
        match params {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(Error::UnexpectedResponse(format!(
                "request params must be an object, got {}",
                other
            ))),
        }
    }

    /// Send a JSON-RPC request and check we don't get an error response.
    async fn send_request<R>(&self, method: &str, params: Value) -> Result<R, Error>
    where
        R: for<'de> Deserialize<'de>,
    {
        let mut service = self.service.lock().await;
        service.ready().await.map_err(|_| Error::NotReady)?;
        let id_num = self.next_id_counter.fetch_add(1, Ordering::SeqCst);
        let id = RequestId::Number(id_num);

        let request = JsonRpcMessage::Request(JsonRpcRequest {
            jsonrpc: JsonRpcVersion2_0,
            id: id.clone(),
            request: Request {
                method: method.to_string(),
                params: Self::params_object(params)?,
                extensions: Default::default(),
            },
        });

        let response_msg = service
            .call(request)
            .await
            .map_err(|e| Error::McpServerError {
                server: self.server_name(),
                method: method.to_string(),
                source: e,
            })?;

        match response_msg {
            JsonRpcMessage::Response(JsonRpcResponse {
                id: response_id,
                result,
                ..
            }) => {
                if response_id != id {
                    return Err(Error::UnexpectedResponse(
                        "id mismatch for JsonRpcResponse".to_string(),
                    ));
                }
                Ok(serde_json::from_value(serde_json::to_value(result)?)?)
            }
            JsonRpcMessage::Error(JsonRpcError {
                id: response_id,
                error,
                ..
            }) => {
                if response_id != id {
                    return Err(Error::UnexpectedResponse(
                        "id mismatch for JsonRpcError".to_string(),
                    ));
                }
                Err(Error::RpcError {
                    code: error.code.0,
                    message: error.message.to_string(),
                })
            }
            _ => Err(Error::UnexpectedResponse(
                "unexpected message type".to_string(),
            )),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), Error> {
        let mut service = self.service.lock().await;
        service.ready().await.map_err(|_| Error::NotReady)?;

        let notification = JsonRpcMessage::Notification(JsonRpcNotification {
            jsonrpc: JsonRpcVersion2_0,
            notification: Notification {
                method: method.to_string(),
                params: Self::params_object(params)?,
                extensions: Default::default(),
            },
        });

        service
            .call(notification)
            .await
            .map_err(|e| Error::McpServerError {
                server: self.server_name(),
                method: method.to_string(),
                source: e,
            })?;

        Ok(())
    }

    fn capabilities(&self) -> Result<&ServerCapabilities, Error> {
        self.server_capabilities
            .as_ref()
            .ok_or(Error::NotInitialized)
    }

    /// Follow `nextCursor` until the server has listed every tool.
    pub async fn list_all_tools(&self) -> Result<Vec<crate::protocol::Tool>, Error> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.list_tools(cursor).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }
}

impl<T> Drop for McpClient<T>
where
    T: TransportHandle + Send + Sync + 'static,
{
    // the receive loop holds a clone of the transport handle
    fn drop(&mut self) {
        self.receive_loop.abort();
    }
}

#[async_trait::async_trait]
impl<T> McpClientTrait for McpClient<T>
where
    T: TransportHandle + Send + Sync + 'static,
{
    async fn initialize(
        &mut self,
        info: ClientInfo,
        capabilities: ClientCapabilities,
    ) -> Result<InitializeResult, Error> {
        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            client_info: info,
            capabilities,
        };
        let result: InitializeResult = self
            .send_request("initialize", serde_json::to_value(params)?)
            .await?;

        self.send_notification("notifications/initialized", json!({}))
            .await?;

        self.server_capabilities = Some(result.capabilities.clone());
        self.server_info = Some(result.server_info.clone());

        Ok(result)
    }

    async fn list_tools(&self, next_cursor: Option<String>) -> Result<ListToolsResult, Error> {
        // A server without the tools capability simply has none
        if self.capabilities()?.tools.is_none() {
            return Ok(ListToolsResult::default());
        }

        let payload = next_cursor
            .map(|cursor| json!({ "cursor": cursor }))
            .unwrap_or_else(|| json!({}));

        self.send_request("tools/list", payload).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, Error> {
        if self.capabilities()?.tools.is_none() {
            return Err(Error::RpcError {
                code: METHOD_NOT_FOUND,
                message: "Server does not support 'tools' capability".to_string(),
            });
        }

        let params = json!({ "name": name, "arguments": arguments });
        self.send_request("tools/call", params).await
    }
}
