use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use metrics::counter;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, instrument, warn};

use super::{config::FailurePolicy, panic_message};
use crate::{
    gateway::{GatewayError, GatewayResult, QueueAddress, QueueGateway},
    handler::MessageHandler,
    message::{normalize, NormalizedMessage, RawMessage},
};

/// Normalizes, handles and settles single messages for one queue
pub(crate) struct Dispatcher {
    gateway: Arc<dyn QueueGateway>,
    handler: Arc<dyn MessageHandler>,
    address: QueueAddress,
    failure_policy: FailurePolicy,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    pub(crate) fn new(
        gateway: Arc<dyn QueueGateway>,
        handler: Arc<dyn MessageHandler>,
        address: QueueAddress,
        failure_policy: FailurePolicy,
        handler_timeout: Option<Duration>,
    ) -> Self {
        Self {
            gateway,
            handler,
            address,
            failure_policy,
            handler_timeout,
        }
    }

    /// Dispatches one message, forwarding unrecovered gateway errors to the
    /// owning loop when the failure policy is fatal
    pub(crate) async fn run(&self, raw: RawMessage, fatal_tx: UnboundedSender<GatewayError>) {
        let Err(error) = self.dispatch(raw).await else {
            return;
        };

        match self.failure_policy {
            FailurePolicy::Fatal => {
                error!(
                    queue = %self.address.name(),
                    operation = error.operation(),
                    error = ?error,
                    "Failed to settle message, stopping queue poller"
                );
                // The loop may already be gone if another dispatch failed first
                let _ = fatal_tx.send(error);
            }
            FailurePolicy::LogAndContinue => {
                warn!(
                    queue = %self.address.name(),
                    operation = error.operation(),
                    error = ?error,
                    "Failed to settle message, it will reappear after its visibility timeout"
                );
            }
        }
    }

    #[instrument(skip_all, fields(queue = %self.address.name(), message_id = %raw.message_id))]
    async fn dispatch(&self, raw: RawMessage) -> GatewayResult<()> {
        let message = normalize(&raw);
        let ack_token = message.ack_token.clone();

        debug!(origin = ?message.origin, "Handling message");

        if self.verdict(message).await {
            self.gateway.acknowledge(&self.address, &ack_token).await?;
            counter!("sqs_consumer_messages_acknowledged", "queue" => self.address.name().to_string())
                .increment(1);
            info!("Message handled");
        } else {
            self.gateway.release(&self.address, &ack_token).await?;
            counter!("sqs_consumer_messages_released", "queue" => self.address.name().to_string())
                .increment(1);
            info!("Failed to handle message, released for redelivery");
        }

        Ok(())
    }

    /// Runs the handler; a panic or an expired deadline counts as `false`
    async fn verdict(&self, message: NormalizedMessage) -> bool {
        let handling = AssertUnwindSafe(self.handler.handle(message)).catch_unwind();

        let outcome = match self.handler_timeout {
            Some(deadline) => {
                if let Ok(outcome) = tokio::time::timeout(deadline, handling).await {
                    outcome
                } else {
                    warn!(?deadline, "Handler timed out");
                    counter!("sqs_consumer_handler_failures", "queue" => self.address.name().to_string(), "reason" => "timeout")
                        .increment(1);
                    return false;
                }
            }
            None => handling.await,
        };

        outcome.unwrap_or_else(|payload| {
            error!(panic = %panic_message(payload.as_ref()), "Handler panicked");
            counter!("sqs_consumer_handler_failures", "queue" => self.address.name().to_string(), "reason" => "panic")
                .increment(1);
            false
        })
    }
}
