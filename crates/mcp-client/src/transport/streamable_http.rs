use crate::transport::Error;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use rmcp::model::{ErrorCode, ErrorData, JsonRpcError, JsonRpcMessage, JsonRpcVersion2_0, RequestId};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Duration;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::{Transport, TransportHandle};

const HTTP_TIMEOUT_SECS: u64 = 30;
const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const PROTOCOL_VERSION: &str = "2025-06-18";
const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Owns the HTTP side of a Streamable HTTP connection.
///
/// Every outgoing message is a POST to the endpoint. A request is answered either
/// with a single `application/json` body or with a `text/event-stream` body carrying
/// one or more JSON-RPC messages. Notifications are acknowledged with 202 and no body.
struct StreamableHttpActor {
    receiver: mpsc::Receiver<String>,
    sender: mpsc::Sender<JsonRpcMessage>,
    endpoint: String,
    http_client: HttpClient,
    session_id: Arc<RwLock<Option<String>>>,
    cancel: CancellationToken,
}

impl StreamableHttpActor {
    async fn run(mut self) {
        loop {
            let message_str = tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = self.receiver.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            let request_id = match serde_json::from_str::<JsonRpcMessage>(&message_str) {
                Ok(JsonRpcMessage::Request(request)) => Some(request.id),
                Ok(_) => None,
                Err(e) => {
                    warn!("Dropping unparseable outgoing message: {}", e);
                    continue;
                }
            };

            if let Err(e) = self.post(&message_str, request_id.is_some()).await {
                warn!(error = %e, "Streamable HTTP request failed");
                // Fail the pending request now instead of leaving it to the client timeout
                if let Some(id) = request_id {
                    let _ = self.sender.send(transport_failure(id, &e)).await;
                }
            }
        }

        debug!("StreamableHttpActor shut down");
    }

    async fn post(&mut self, message_str: &str, expects_response: bool) -> Result<(), Error> {
        debug!("Sending message to MCP endpoint: {}", message_str);

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION)
            .body(message_str.to_string());

        if let Some(session_id) = self.session_id.read().await.as_ref() {
            request = request.header(SESSION_ID_HEADER, session_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 404 {
                *self.session_id.write().await = None;
                return Err(Error::SessionExpired);
            }
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Http {
                status: status.as_u16(),
                message,
            });
        }

        if let Some(session_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            debug!("Received session ID: {}", session_id);
            *self.session_id.write().await = Some(session_id.to_string());
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !expects_response {
            return Ok(());
        }

        if content_type.starts_with("text/event-stream") {
            self.forward_event_stream(response).await
        } else {
            let body = response
                .text()
                .await
                .map_err(|e| Error::Request(e.to_string()))?;
            if body.trim().is_empty() {
                return Err(Error::EmptyResponse);
            }
            let message: JsonRpcMessage = serde_json::from_str(&body)?;
            let _ = self.sender.send(message).await;
            Ok(())
        }
    }

    /// Forward each `data:` event of an SSE-framed response as a JSON-RPC message.
    async fn forward_event_stream(&mut self, response: reqwest::Response) -> Result<(), Error> {
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let mut lines = tokio::io::BufReader::new(StreamReader::new(stream)).lines();

        let mut data = String::new();
        while let Some(line) = lines.next_line().await? {
            if line.is_empty() {
                self.flush_event(&mut data).await;
            } else if let Some(field) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(field.strip_prefix(' ').unwrap_or(field));
            }
            // event/id/retry fields carry nothing we route on
        }
        self.flush_event(&mut data).await;
        Ok(())
    }

    async fn flush_event(&self, data: &mut String) {
        if data.is_empty() {
            return;
        }
        match serde_json::from_str::<JsonRpcMessage>(data) {
            Ok(message) => {
                let _ = self.sender.send(message).await;
            }
            Err(err) => warn!("Failed to parse streamed message: {}", err),
        }
        data.clear();
    }
}

fn transport_failure(id: RequestId, error: &Error) -> JsonRpcMessage {
    JsonRpcMessage::Error(JsonRpcError {
        jsonrpc: JsonRpcVersion2_0,
        id,
        error: ErrorData {
            code: ErrorCode::INTERNAL_ERROR,
            message: error.to_string().into(),
            data: None,
        },
    })
}

#[derive(Clone)]
pub struct StreamableHttpTransportHandle {
    sender: mpsc::Sender<String>,
    receiver: Arc<Mutex<mpsc::Receiver<JsonRpcMessage>>>,
    session_id: Arc<RwLock<Option<String>>>,
    endpoint: String,
    http_client: HttpClient,
    cancel: CancellationToken,
}

#[async_trait]
impl TransportHandle for StreamableHttpTransportHandle {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), Error> {
        let encoded = serde_json::to_string(&message)?;
        self.sender
            .send(encoded)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    async fn receive(&self) -> Result<JsonRpcMessage, Error> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await.ok_or(Error::ChannelClosed)
    }
}

impl StreamableHttpTransportHandle {
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Terminate the server-side session with an HTTP DELETE, if one was assigned.
    pub async fn terminate_session(&self) -> Result<(), Error> {
        let Some(session_id) = self.session_id.write().await.take() else {
            return Ok(());
        };

        let request = self
            .http_client
            .delete(&self.endpoint)
            .header(SESSION_ID_HEADER, session_id)
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION);

        match request.send().await {
            Ok(response) if response.status().as_u16() == 405 => {
                debug!("Server doesn't support session termination");
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to terminate session: {}", e),
        }
        Ok(())
    }

    /// Terminate the session and stop the actor. Pending and later receives
    /// fail with [`Error::ChannelClosed`].
    pub async fn close(&self) -> Result<(), Error> {
        let terminated = self.terminate_session().await;
        self.cancel.cancel();
        terminated
    }
}

#[derive(Clone)]
pub struct StreamableHttpTransport {
    endpoint: String,
}

impl StreamableHttpTransport {
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn validate_endpoint(endpoint: &str) -> Result<(), Error> {
        let url = Url::parse(endpoint)
            .map_err(|e| Error::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(Error::InvalidEndpoint(format!("unsupported scheme {}", other))),
        }
    }

    fn http_client() -> Result<HttpClient, Error> {
        HttpClient::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Request(format!("Failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    type Handle = StreamableHttpTransportHandle;

    async fn start(&self) -> Result<Self::Handle, Error> {
        Self::validate_endpoint(&self.endpoint)?;

        let (tx, rx) = mpsc::channel(32);
        let (otx, orx) = mpsc::channel(32);
        let session_id: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));
        let http_client = Self::http_client()?;
        let cancel = CancellationToken::new();

        let actor = StreamableHttpActor {
            receiver: rx,
            sender: otx,
            endpoint: self.endpoint.clone(),
            http_client: http_client.clone(),
            session_id: Arc::clone(&session_id),
            cancel: cancel.clone(),
        };
        tokio::spawn(actor.run());

        Ok(StreamableHttpTransportHandle {
            sender: tx,
            receiver: Arc::new(Mutex::new(orx)),
            session_id,
            endpoint: self.endpoint.clone(),
            http_client,
            cancel,
        })
    }
}
