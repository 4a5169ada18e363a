use std::{sync::Arc, time::Duration};

use metrics::counter;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use super::{config::RetryConfig, dispatch::Dispatcher};
use crate::{
    gateway::{GatewayError, GatewayResult, QueueAddress, QueueGateway, ReceiveSettings},
    message::RawMessage,
};

/// Receive loop for a single queue address
///
/// Every received message is dispatched on its own task; the loop goes
/// straight back to receiving without waiting for them.
pub(crate) struct QueuePoller {
    gateway: Arc<dyn QueueGateway>,
    dispatcher: Arc<Dispatcher>,
    address: QueueAddress,
    settings: ReceiveSettings,
    retry: RetryConfig,
    in_flight: Option<Arc<Semaphore>>,
    drain_timeout: Duration,
    shutdown: CancellationToken,
}

impl QueuePoller {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        gateway: Arc<dyn QueueGateway>,
        dispatcher: Dispatcher,
        address: QueueAddress,
        settings: ReceiveSettings,
        retry: RetryConfig,
        max_in_flight: Option<usize>,
        drain_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            dispatcher: Arc::new(dispatcher),
            address,
            settings,
            retry,
            in_flight: max_in_flight.map(|permits| Arc::new(Semaphore::new(permits))),
            drain_timeout,
            shutdown,
        }
    }

    /// Polls until shutdown or an unrecovered gateway failure
    pub(crate) async fn run(self) -> GatewayResult<()> {
        info!(queue = %self.address.name(), "Starting queue poller");

        let tracker = TaskTracker::new();
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<GatewayError>();

        let result = loop {
            let batch = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break Ok(()),
                Some(error) = fatal_rx.recv() => break Err(error),
                batch = self.receive() => match batch {
                    Ok(batch) => batch,
                    Err(error) => break Err(error),
                },
            };

            self.dispatch_batch(batch, &tracker, &fatal_tx).await;
        };

        match result {
            Ok(()) => {
                self.drain(&tracker).await;
                info!(queue = %self.address.name(), "Queue poller shutdown complete");
                Ok(())
            }
            Err(error) => {
                error!(
                    queue = %self.address.name(),
                    operation = error.operation(),
                    error = ?error,
                    "Queue poller stopped"
                );
                Err(error)
            }
        }
    }

    async fn receive(&self) -> GatewayResult<Vec<RawMessage>> {
        let mut attempt = 0;

        loop {
            debug!(queue = %self.address.name(), "Polling messages");

            match self.gateway.receive_batch(&self.address, self.settings).await {
                Ok(batch) => {
                    debug!(queue = %self.address.name(), count = batch.len(), "Received messages");
                    return Ok(batch);
                }
                Err(error) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        queue = %self.address.name(),
                        attempt,
                        ?delay,
                        error = ?error,
                        "Failed to receive messages, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn dispatch_batch(
        &self,
        batch: Vec<RawMessage>,
        tracker: &TaskTracker,
        fatal_tx: &mpsc::UnboundedSender<GatewayError>,
    ) {
        if batch.is_empty() {
            return;
        }

        counter!("sqs_consumer_messages_received", "queue" => self.address.name().to_string())
            .increment(batch.len() as u64);

        for raw in batch {
            // A closed semaphore never happens, it would only lift the cap
            let permit = match &self.in_flight {
                Some(semaphore) => tokio::select! {
                    () = self.shutdown.cancelled() => {
                        // Undispatched messages come back after their visibility timeout
                        return;
                    }
                    permit = Arc::clone(semaphore).acquire_owned() => permit.ok(),
                },
                None => None,
            };

            let dispatcher = Arc::clone(&self.dispatcher);
            let fatal_tx = fatal_tx.clone();
            tracker.spawn(async move {
                dispatcher.run(raw, fatal_tx).await;
                drop(permit);
            });
        }
    }

    async fn drain(&self, tracker: &TaskTracker) {
        tracker.close();
        if tracker.is_empty() {
            return;
        }

        info!(
            queue = %self.address.name(),
            in_flight = tracker.len(),
            "Waiting for in-flight messages"
        );
        if tokio::time::timeout(self.drain_timeout, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                queue = %self.address.name(),
                in_flight = tracker.len(),
                "In-flight messages did not finish before the drain timeout"
            );
        }
    }
}
