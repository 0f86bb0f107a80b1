//! Message transports for talking to a tool server.
//!
//! A [`Transport`] knows how to reach a server; starting it yields a cloneable
//! [`TransportHandle`] that moves whole JSON-RPC messages in both directions.

use async_trait::async_trait;
use rmcp::model::JsonRpcMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Transport closed")]
    ChannelClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Only requests and notifications can be sent")]
    UnsupportedMessage,

    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server returned an empty body for a request")]
    EmptyResponse,

    #[error("Session expired or not found")]
    SessionExpired,
}

#[async_trait]
pub trait Transport {
    type Handle: TransportHandle;

    /// Start the transport. Nothing is sent until the first message.
    async fn start(&self) -> Result<Self::Handle, Error>;
}

#[async_trait]
pub trait TransportHandle: Send + Sync + Clone + 'static {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), Error>;
    async fn receive(&self) -> Result<JsonRpcMessage, Error>;
}

pub mod streamable_http;
pub use streamable_http::StreamableHttpTransport;
