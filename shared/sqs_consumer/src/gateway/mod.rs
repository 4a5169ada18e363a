//! Queue gateway
//!
//! The five queue operations the consumer needs, behind a trait so the
//! consumption loop can run against SQS in production and an in-memory
//! double in tests.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Error types for gateway operations
pub mod error;
/// AWS SQS implementation
pub mod sqs_gateway;

use std::fmt;

use async_trait::async_trait;

use crate::message::RawMessage;

pub use error::{GatewayError, GatewayResult};
pub use sqs_gateway::SqsGateway;

/// Visibility timeout applied when releasing a message
pub const RELEASE_VISIBILITY_TIMEOUT: i32 = 0;

/// Backend handle identifying one queue (the queue URL for SQS)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueAddress(String);

impl QueueAddress {
    /// Wraps a backend queue handle
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the raw handle
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the queue name, the last path segment of the address
    #[must_use]
    pub fn name(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for QueueAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueueAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl From<&str> for QueueAddress {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

/// Parameters of a long-poll receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveSettings {
    /// Maximum number of messages to return
    pub max_messages: i32,
    /// Seconds to wait for messages before returning an empty batch
    pub wait_time_seconds: i32,
    /// Seconds received messages stay hidden from other receivers
    pub visibility_timeout: i32,
}

/// Capability interface over a message queue backend
#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// Resolves a queue name to its address
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::AddressResolution` if the queue does not exist or
    /// the call fails
    async fn resolve_address(&self, name: &str) -> GatewayResult<QueueAddress>;

    /// Lists the addresses of every queue whose name starts with `prefix`
    ///
    /// An empty list is returned when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Discovery` on transport or authorization failures
    async fn list_addresses(&self, prefix: &str) -> GatewayResult<Vec<QueueAddress>>;

    /// Long-polls up to `settings.max_messages` messages
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Receive` on transport failures
    async fn receive_batch(
        &self,
        address: &QueueAddress,
        settings: ReceiveSettings,
    ) -> GatewayResult<Vec<RawMessage>>;

    /// Deletes a message; deleting an already deleted message succeeds
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Acknowledge` if the token is unknown or expired
    async fn acknowledge(&self, address: &QueueAddress, ack_token: &str) -> GatewayResult<()>;

    /// Makes a message visible again right away by setting its visibility
    /// timeout to [`RELEASE_VISIBILITY_TIMEOUT`]
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Release` if the token is unknown or expired
    async fn release(&self, address: &QueueAddress, ack_token: &str) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_address_name() {
        let address = QueueAddress::new("https://sqs.us-east-1.amazonaws.com/123456789012/orders");
        assert_eq!(address.name(), "orders");

        let address = QueueAddress::new("http://localhost:4566/000000000000/orders.fifo/");
        assert_eq!(address.name(), "orders.fifo");

        assert_eq!(QueueAddress::from("orders").name(), "orders");
    }
}
