//! Runs a set of independently configured consumers side by side

use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::consumer::{panic_message, Consumer, ConsumerError};

/// A consumer that stopped with an error
#[derive(Debug)]
pub struct ConsumerFailure {
    /// Queue name or prefix of the failed consumer
    pub queue_name: String,
    /// Why it stopped
    pub error: ConsumerError,
}

/// Owns a set of consumers and runs them concurrently
///
/// Each consumer runs on its own task, so one consumer failing leaves the
/// others running.
pub struct ConsumerRegistry {
    consumers: Vec<Consumer>,
    shutdown_token: CancellationToken,
    failed: Arc<AtomicUsize>,
}

impl ConsumerRegistry {
    /// Creates a registry; consumers are driven by the registry's shutdown
    /// token rather than their own
    #[must_use]
    pub fn new(consumers: Vec<Consumer>) -> Self {
        Self {
            consumers,
            shutdown_token: CancellationToken::new(),
            failed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Live count of consumers that have stopped with an error
    ///
    /// Updated as soon as each consumer fails, while the others keep running.
    #[must_use]
    pub fn failed_consumers(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.failed)
    }

    /// Returns a clone of the shutdown token for external control
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Number of registered consumers
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Whether no consumer is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Starts every consumer and waits until all of them have stopped
    ///
    /// In normal operation that only happens after shutdown. Returns the
    /// consumers that stopped with an error, in the order they failed.
    pub async fn run(self) -> Vec<ConsumerFailure> {
        info!("Starting {} consumers", self.consumers.len());

        let mut tasks = JoinSet::new();
        for consumer in self.consumers {
            let queue_name = consumer.queue_name().to_string();
            let shutdown = self.shutdown_token.child_token();

            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(consumer.run_until(shutdown))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(ConsumerError::TaskFailed(panic_message(payload.as_ref())))
                    });
                (queue_name, outcome)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((queue_name, Ok(()))) => {
                    info!(queue_name = %queue_name, "Consumer finished");
                }
                Ok((queue_name, Err(error))) => {
                    error!(queue_name = %queue_name, error = %error, "Consumer failed");
                    self.failed.fetch_add(1, Ordering::SeqCst);
                    failures.push(ConsumerFailure { queue_name, error });
                }
                Err(join_error) => {
                    error!(error = %join_error, "Consumer task aborted");
                    self.failed.fetch_add(1, Ordering::SeqCst);
                    failures.push(ConsumerFailure {
                        queue_name: String::new(),
                        error: ConsumerError::TaskFailed(join_error.to_string()),
                    });
                }
            }
        }

        info!("All consumers stopped");
        failures
    }
}
