//! LocalStack queue setup utilities

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_sqs::Client as SqsClient;
use std::sync::Arc;
use uuid::Uuid;

/// Test context that provides an SQS client and a uniquely named queue
pub struct QueueTestContext {
    pub sqs_client: Arc<SqsClient>,
    pub queue_name: String,
    pub queue_url: String,
}

impl QueueTestContext {
    /// Creates a new standard queue named `{test_name}-{uuid}`
    pub async fn new(test_name: &str) -> Self {
        let queue_name = format!("{}-{}", test_name, Uuid::new_v4());
        Self::with_queue_name(queue_name).await
    }

    /// Creates a queue with an exact name
    pub async fn with_queue_name(queue_name: String) -> Self {
        // Setup LocalStack client with hardcoded credentials for CI
        let credentials = Credentials::from_keys(
            "test", // AWS_ACCESS_KEY_ID
            "test", // AWS_SECRET_ACCESS_KEY
            None,   // no session token
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url("http://localhost:4566")
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(credentials)
            .load()
            .await;

        let sqs_client = Arc::new(SqsClient::new(&config));

        let result = sqs_client
            .create_queue()
            .queue_name(&queue_name)
            .send()
            .await
            .expect("Failed to create test queue");

        let queue_url = result
            .queue_url()
            .expect("Queue URL not returned")
            .to_string();

        Self {
            sqs_client,
            queue_name,
            queue_url,
        }
    }
}

impl Drop for QueueTestContext {
    fn drop(&mut self) {
        // Clean up the queue
        let client = self.sqs_client.clone();
        let queue_url = self.queue_url.clone();

        // Use tokio runtime to delete queue
        let handle = tokio::runtime::Handle::try_current();
        if let Ok(handle) = handle {
            handle.spawn(async move {
                let _ = client.delete_queue().queue_url(&queue_url).send().await;
            });
        }
    }
}
