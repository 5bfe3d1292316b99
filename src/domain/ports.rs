use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Handles raw packets arriving on a transport and produces the raw response.
#[async_trait]
pub trait IncomingHandler: Send + Sync {
    async fn handle(&self, request: Vec<u8>) -> Result<Vec<u8>>;
}

/// A bidirectional packet transport (one account on one node).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and waits for its response. No local timeout is applied.
    async fn send(&self, request: Vec<u8>) -> Result<Vec<u8>>;
    /// Installs the handler invoked for every incoming request, replacing any previous one.
    fn register_handler(&self, handler: HandlerArc);
    fn deregister_handler(&self);
}

/// Decides whether a payment that arrived with `amount` may be fulfilled.
#[async_trait]
pub trait ResolutionPolicy: Send + Sync {
    async fn authorize(&self, amount: u64) -> bool;
}

#[async_trait]
impl<F> ResolutionPolicy for F
where
    F: Fn(u64) -> bool + Send + Sync,
{
    async fn authorize(&self, amount: u64) -> bool {
        self(amount)
    }
}

pub type HandlerArc = Arc<dyn IncomingHandler>;
pub type TransportArc = Arc<dyn Transport>;
pub type PolicyArc = Arc<dyn ResolutionPolicy>;
