//! Message handler seam

use std::future::Future;

use async_trait::async_trait;

use crate::message::NormalizedMessage;

/// Processes one message and reports whether it may be deleted
///
/// Returning `true` acknowledges (deletes) the message. Returning `false`
/// releases it for immediate redelivery. Queues deliver at least once, so
/// handlers are invoked concurrently and may see the same message again.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles a single message
    async fn handle(&self, message: NormalizedMessage) -> bool;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(NormalizedMessage) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn handle(&self, message: NormalizedMessage) -> bool {
        (self)(message).await
    }
}
