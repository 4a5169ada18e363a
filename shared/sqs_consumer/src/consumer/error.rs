use thiserror::Error;

use crate::gateway::GatewayError;

/// Invalid consumer configuration, reported when the consumer is built
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No queue name or prefix was given
    #[error("Queue name is required")]
    MissingQueueName,

    /// Batch size outside what SQS accepts
    #[error("Batch size must be between 1 and 10, got {0}")]
    InvalidBatchSize(i32),

    /// Long-poll wait outside what SQS accepts
    #[error("Wait time must be between 0 and 20 seconds, got {0}")]
    InvalidWaitTime(i32),

    /// Visibility timeout outside what SQS accepts
    #[error("Visibility timeout must be between 0 and 43200 seconds, got {0}")]
    InvalidVisibilityTimeout(i32),

    /// A concurrency cap of zero would never dispatch anything
    #[error("Maximum in-flight messages must be greater than zero")]
    ZeroMaxInFlight,
}

/// Reasons a consumer stops with an error
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// The configuration was rejected at construction
    #[error("Invalid consumer configuration: {0}")]
    Config(#[from] ConfigError),

    /// A gateway call failed and was not recovered
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A consumer or loop task panicked or was aborted
    #[error("Consumer task failed: {0}")]
    TaskFailed(String),
}
