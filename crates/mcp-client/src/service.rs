use futures::future::BoxFuture;
use rmcp::model::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, JsonRpcVersion2_0, RequestId};
use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{oneshot, RwLock};
use tower::Service;

use crate::transport::{Error, TransportHandle};

type ResponseSender = oneshot::Sender<Result<JsonRpcMessage, Error>>;

/// Tower service over a transport handle.
///
/// Requests park a oneshot sender keyed by request id until the receive loop in
/// [`crate::McpClient`] routes the matching response back through [`McpService::respond`].
#[derive(Clone)]
pub struct McpService<T: TransportHandle> {
    inner: Arc<T>,
    pending_requests: Arc<PendingRequests>,
}

impl<T: TransportHandle> McpService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(transport),
            pending_requests: Arc::new(PendingRequests::default()),
        }
    }

    pub async fn respond(&self, id: &str, response: Result<JsonRpcMessage, Error>) {
        self.pending_requests.respond(id, response).await
    }

    /// Fail every waiting request, used when the transport's receive side ends.
    pub async fn hangup(&self) {
        self.pending_requests.broadcast_close().await
    }
}

impl<T> Service<JsonRpcMessage> for McpService<T>
where
    T: TransportHandle + Send + Sync + 'static,
{
    type Response = JsonRpcMessage;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: JsonRpcMessage) -> Self::Future {
        let transport = self.inner.clone();
        let pending_requests = self.pending_requests.clone();

        Box::pin(async move {
            match &request {
                JsonRpcMessage::Request(JsonRpcRequest { id, .. }) => {
                    let key = id.to_string();
                    let (sender, receiver) = oneshot::channel();
                    pending_requests.insert(key.clone(), sender).await;

                    if let Err(e) = transport.send(request).await {
                        pending_requests.remove(&key).await;
                        return Err(e);
                    }
                    receiver.await.map_err(|_| Error::ChannelClosed)?
                }
                JsonRpcMessage::Notification(_) => {
                    transport.send(request).await?;
                    // Notifications have no reply; hand back an empty acknowledgement
                    Ok(JsonRpcMessage::Response(JsonRpcResponse {
                        jsonrpc: JsonRpcVersion2_0,
                        id: RequestId::Number(0),
                        result: serde_json::Map::new(),
                    }))
                }
                _ => Err(Error::UnsupportedMessage),
            }
        })
    }
}

#[derive(Default)]
pub struct PendingRequests {
    requests: RwLock<HashMap<String, ResponseSender>>,
}

impl PendingRequests {
    pub async fn insert(&self, id: String, sender: ResponseSender) {
        self.requests.write().await.insert(id, sender);
    }

    pub async fn remove(&self, id: &str) {
        self.requests.write().await.remove(id);
    }

    pub async fn respond(&self, id: &str, response: Result<JsonRpcMessage, Error>) {
        match self.requests.write().await.remove(id) {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::debug!(id, "Response for unknown or expired request"),
        }
    }

    pub async fn broadcast_close(&self) {
        for (_, tx) in self.requests.write().await.drain() {
            let _ = tx.send(Err(Error::ChannelClosed));
        }
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pending_requests_respond_once() {
        let pending = PendingRequests::default();
        let (tx, rx) = oneshot::channel();
        pending.insert("1".to_string(), tx).await;
        assert_eq!(pending.len().await, 1);

        pending.respond("1", Err(Error::SessionExpired)).await;
        assert!(pending.is_empty().await);
        assert!(matches!(rx.await, Ok(Err(Error::SessionExpired))));

        // a second response for the same id is dropped
        pending.respond("1", Err(Error::SessionExpired)).await;
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_broadcast_close_fails_all_waiters() {
        let pending = PendingRequests::default();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        pending.insert("1".to_string(), tx1).await;
        pending.insert("2".to_string(), tx2).await;

        pending.broadcast_close().await;

        assert!(matches!(rx1.await, Ok(Err(Error::ChannelClosed))));
        assert!(matches!(rx2.await, Ok(Err(Error::ChannelClosed))));
        assert!(pending.is_empty().await);
    }
}
