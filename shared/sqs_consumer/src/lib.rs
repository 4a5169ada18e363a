//! Concurrent SQS consumer engine
//!
//! This crate receives batches from one or many SQS queues, unwraps SNS
//! fan-out envelopes, hands every message to a caller-supplied handler and
//! deletes or releases the message depending on the handler's verdict.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

pub mod consumer;
pub mod gateway;
pub mod handler;
pub mod message;
pub mod registry;

pub use consumer::{
    ConfigError, Consumer, ConsumerConfig, ConsumerError, FailurePolicy, RetryConfig,
};
pub use gateway::{GatewayError, QueueAddress, QueueGateway, ReceiveSettings, SqsGateway};
pub use handler::MessageHandler;
pub use message::{normalize, MessageOrigin, NormalizedMessage, RawMessage};
pub use registry::{ConsumerFailure, ConsumerRegistry};
