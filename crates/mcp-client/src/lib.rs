pub mod client;
pub mod protocol;
pub mod service;
pub mod transport;

pub use client::{ClientCapabilities, ClientInfo, Error, McpClient, McpClientTrait};
pub use service::McpService;
pub use transport::{StreamableHttpTransport, Transport, TransportHandle};
