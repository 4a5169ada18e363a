//! Consumer: resolves its queues and runs one receive loop per queue

mod config;
mod dispatch;
mod error;
mod poller;

use std::{any::Any, sync::Arc};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use config::{
    ConsumerConfig, FailurePolicy, RetryConfig, DEFAULT_DRAIN_TIMEOUT, DEFAULT_MAX_MESSAGES,
    DEFAULT_VISIBILITY_TIMEOUT, DEFAULT_WAIT_TIME_SECONDS,
};
pub use error::{ConfigError, ConsumerError};

use self::{dispatch::Dispatcher, poller::QueuePoller};
use crate::gateway::{QueueAddress, QueueGateway};

/// Consumes one queue, or every queue matching a name prefix
pub struct Consumer {
    gateway: Arc<dyn QueueGateway>,
    config: ConsumerConfig,
    shutdown_token: CancellationToken,
}

impl Consumer {
    /// Creates a new consumer
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError::Config` if the configuration is invalid, e.g.
    /// the queue name is empty
    pub fn new(
        gateway: Arc<dyn QueueGateway>,
        config: ConsumerConfig,
    ) -> Result<Self, ConsumerError> {
        config.validate()?;

        Ok(Self {
            gateway,
            config,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Returns the configuration
    #[must_use]
    pub const fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Returns the queue name or prefix
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    /// Returns a clone of the consumer's own shutdown token
    ///
    /// Cancelling it stops this consumer whether it was started with
    /// [`Consumer::start`], [`Consumer::run_until`] or by a registry.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Consumes until the shutdown token is cancelled
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError::Gateway` when queue resolution, discovery or a
    /// receive loop fails
    pub async fn start(self) -> Result<(), ConsumerError> {
        let shutdown = self.shutdown_token.clone();
        self.run_until(shutdown).await
    }

    /// Consumes until `shutdown` or the consumer's own token is cancelled
    ///
    /// Discovery happens once; queues created later are not picked up. When
    /// one receive loop fails the sibling loops are stopped and the failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError::Gateway` when queue resolution, discovery or a
    /// receive loop fails
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<(), ConsumerError> {
        let addresses = self.addresses().await?;

        let loop_token = shutdown.child_token();
        let own_token = self.shutdown_token.clone();
        let linked = loop_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = own_token.cancelled() => linked.cancel(),
                () = linked.cancelled() => {}
            }
        });

        if addresses.is_empty() {
            warn!(
                prefix = %self.config.queue_name,
                "No queues match the prefix, waiting for shutdown"
            );
            loop_token.cancelled().await;
            return Ok(());
        }

        info!(
            queue_name = %self.config.queue_name,
            queues = addresses.len(),
            "Starting consumer"
        );

        let mut loops = JoinSet::new();
        for address in addresses {
            loops.spawn(self.poller(address, loop_token.clone()).run());
        }

        let mut result = Ok(());
        while let Some(joined) = loops.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome.map_err(ConsumerError::from),
                Err(join_error) => Err(ConsumerError::TaskFailed(join_error.to_string())),
            };

            if let Err(error) = outcome {
                if result.is_ok() {
                    error!(
                        queue_name = %self.config.queue_name,
                        error = %error,
                        "Queue poller failed, stopping consumer"
                    );
                    loop_token.cancel();
                    result = Err(error);
                }
            }
        }

        loop_token.cancel();
        info!(queue_name = %self.config.queue_name, "Consumer stopped");
        result
    }

    async fn addresses(&self) -> Result<Vec<QueueAddress>, ConsumerError> {
        if self.config.prefix_based {
            let addresses = self.gateway.list_addresses(&self.config.queue_name).await?;
            info!(
                prefix = %self.config.queue_name,
                queues = ?addresses.iter().map(QueueAddress::name).collect::<Vec<_>>(),
                "Discovered queues"
            );
            Ok(addresses)
        } else {
            let address = self.gateway.resolve_address(&self.config.queue_name).await?;
            Ok(vec![address])
        }
    }

    fn poller(&self, address: QueueAddress, shutdown: CancellationToken) -> QueuePoller {
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.config.handler),
            address.clone(),
            self.config.failure_policy,
            self.config.handler_timeout,
        );

        QueuePoller::new(
            Arc::clone(&self.gateway),
            dispatcher,
            address,
            self.config.receive_settings(),
            self.config.receive_retry,
            self.config.max_in_flight,
            self.config.drain_timeout,
            shutdown,
        )
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
