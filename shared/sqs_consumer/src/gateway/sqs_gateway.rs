//! AWS SQS gateway
//!
//! Thin adapter from the [`QueueGateway`] operations to the SQS API. Retries
//! and timeouts are left to the SDK configuration the client was built with.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use aws_sdk_sqs::{
    types::{Message, MessageSystemAttributeName},
    Client as SqsClient,
};
use tracing::warn;

use super::{
    error::{GatewayError, GatewayResult},
    QueueAddress, QueueGateway, ReceiveSettings, RELEASE_VISIBILITY_TIMEOUT,
};
use crate::message::{MessageAttribute, RawMessage};

/// Largest page `ListQueues` accepts
const LIST_QUEUES_PAGE_SIZE: i32 = 1000;

/// Gateway backed by an AWS SQS client
#[derive(Debug, Clone)]
pub struct SqsGateway {
    sqs_client: Arc<SqsClient>,
}

impl SqsGateway {
    /// Creates a new SQS gateway
    ///
    /// # Arguments
    ///
    /// * `sqs_client` - Pre-configured SQS client
    #[must_use]
    pub const fn new(sqs_client: Arc<SqsClient>) -> Self {
        Self { sqs_client }
    }
}

#[async_trait]
impl QueueGateway for SqsGateway {
    async fn resolve_address(&self, name: &str) -> GatewayResult<QueueAddress> {
        let output = self
            .sqs_client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| GatewayError::AddressResolution {
                name: name.to_string(),
                source: e.into(),
            })?;

        output
            .queue_url()
            .map(QueueAddress::from)
            .ok_or_else(|| GatewayError::AddressResolution {
                name: name.to_string(),
                source: "GetQueueUrl returned no queue URL".into(),
            })
    }

    async fn list_addresses(&self, prefix: &str) -> GatewayResult<Vec<QueueAddress>> {
        let mut addresses = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .sqs_client
                .list_queues()
                .queue_name_prefix(prefix)
                .max_results(LIST_QUEUES_PAGE_SIZE)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| GatewayError::Discovery {
                    prefix: prefix.to_string(),
                    source: e.into(),
                })?;

            addresses.extend(output.queue_urls().iter().map(|url| QueueAddress::from(url.as_str())));

            next_token = output.next_token().map(ToString::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(addresses)
    }

    async fn receive_batch(
        &self,
        address: &QueueAddress,
        settings: ReceiveSettings,
    ) -> GatewayResult<Vec<RawMessage>> {
        let output = self
            .sqs_client
            .receive_message()
            .queue_url(address.as_str())
            .max_number_of_messages(settings.max_messages)
            .wait_time_seconds(settings.wait_time_seconds)
            .visibility_timeout(settings.visibility_timeout)
            .message_attribute_names("All")
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| GatewayError::Receive {
                address: address.to_string(),
                source: e.into(),
            })?;

        Ok(output.messages().iter().filter_map(raw_message).collect())
    }

    async fn acknowledge(&self, address: &QueueAddress, ack_token: &str) -> GatewayResult<()> {
        self.sqs_client
            .delete_message()
            .queue_url(address.as_str())
            .receipt_handle(ack_token)
            .send()
            .await
            .map_err(|e| GatewayError::Acknowledge {
                address: address.to_string(),
                source: e.into(),
            })?;

        Ok(())
    }

    async fn release(&self, address: &QueueAddress, ack_token: &str) -> GatewayResult<()> {
        self.sqs_client
            .change_message_visibility()
            .queue_url(address.as_str())
            .receipt_handle(ack_token)
            .visibility_timeout(RELEASE_VISIBILITY_TIMEOUT)
            .send()
            .await
            .map_err(|e| GatewayError::Release {
                address: address.to_string(),
                source: e.into(),
            })?;

        Ok(())
    }
}

/// Converts an SQS message, skipping messages without a handle or id
fn raw_message(message: &Message) -> Option<RawMessage> {
    let (Some(ack_token), Some(message_id)) = (message.receipt_handle(), message.message_id())
    else {
        warn!("Skipping SQS message without receipt handle or message id");
        return None;
    };

    let message_attributes = message
        .message_attributes()
        .map(|attributes| {
            attributes
                .iter()
                .map(|(name, value)| {
                    (
                        name.clone(),
                        MessageAttribute {
                            data_type: value.data_type().to_string(),
                            string_value: value.string_value().map(ToString::to_string),
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let system_attributes: HashMap<String, String> = message
        .attributes()
        .map(|attributes| {
            attributes
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    Some(RawMessage {
        body: message.body().unwrap_or_default().to_string(),
        message_attributes,
        system_attributes,
        ack_token: ack_token.to_string(),
        message_id: message_id.to_string(),
    })
}
