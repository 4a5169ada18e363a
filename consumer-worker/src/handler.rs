use async_trait::async_trait;
use sqs_consumer::{MessageHandler, NormalizedMessage};
use tracing::{debug, info};

/// Logs every message and acknowledges it
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, message: NormalizedMessage) -> bool {
        info!(
            message_id = %message.id,
            origin = ?message.origin,
            attributes = ?message.attributes,
            content_length = message.content.len(),
            receive_count = ?message.receive_count(),
            "Received message"
        );
        debug!(message_id = %message.id, content = %message.content, "Message content");

        true
    }
}
