use crate::domain::ports::{HandlerArc, IncomingHandler, Transport};
use crate::error::{LoopError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Duration;

/// One account of a node, linked in memory to whatever sits on its far side.
///
/// Requests sent on it go to the `remote` handler; requests delivered to it go
/// to the handler registered through [`Transport::register_handler`].
#[derive(Default)]
pub struct InMemoryTransport {
    remote: RwLock<Option<HandlerArc>>,
    handler: RwLock<Option<HandlerArc>>,
    latency: Duration,
}

impl InMemoryTransport {
    /// Creates an unlinked transport with no latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that waits `latency` before every outgoing request.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Links the far side of this account.
    pub fn connect_remote(&self, remote: HandlerArc) {
        *self.remote.write() = Some(remote);
    }

    pub fn has_handler(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Hands an incoming request to the registered handler.
    pub async fn deliver(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        let handler = self
            .handler
            .read()
            .clone()
            .ok_or_else(|| LoopError::Transport("no handler registered".to_string()))?;
        handler.handle(request).await
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let remote = self
            .remote
            .read()
            .clone()
            .ok_or_else(|| LoopError::Transport("transport is not connected".to_string()))?;
        remote.handle(request).await
    }

    fn register_handler(&self, handler: HandlerArc) {
        *self.handler.write() = Some(handler);
    }

    fn deregister_handler(&self) {
        self.handler.write().take();
    }
}

/// Lets a transport act as the far side of another one.
#[async_trait]
impl IncomingHandler for InMemoryTransport {
    async fn handle(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        self.deliver(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl IncomingHandler for Echo {
        async fn handle(&self, request: Vec<u8>) -> Result<Vec<u8>> {
            Ok(request)
        }
    }

    #[tokio::test]
    async fn test_send_reaches_remote() {
        let transport = InMemoryTransport::new();
        assert!(matches!(
            transport.send(vec![1]).await,
            Err(LoopError::Transport(_))
        ));

        transport.connect_remote(Arc::new(Echo));
        assert_eq!(transport.send(vec![1, 2]).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_deliver_uses_registered_handler() {
        let transport = InMemoryTransport::new();
        assert!(transport.deliver(vec![1]).await.is_err());

        transport.register_handler(Arc::new(Echo));
        assert!(transport.has_handler());
        assert_eq!(transport.deliver(vec![3]).await.unwrap(), vec![3]);

        transport.deregister_handler();
        assert!(!transport.has_handler());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_send() {
        let transport = InMemoryTransport::with_latency(Duration::from_millis(50));
        transport.connect_remote(Arc::new(Echo));

        let started = tokio::time::Instant::now();
        transport.send(vec![]).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_transports_chain() {
        let first = InMemoryTransport::new();
        let second = Arc::new(InMemoryTransport::new());
        second.register_handler(Arc::new(Echo));
        first.connect_remote(second);

        assert_eq!(first.send(vec![7]).await.unwrap(), vec![7]);
    }
}
