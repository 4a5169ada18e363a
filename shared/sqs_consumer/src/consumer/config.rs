use std::{fmt, sync::Arc, time::Duration};

use super::error::ConfigError;
use crate::{gateway::ReceiveSettings, handler::MessageHandler};

/// Default number of messages per receive
pub const DEFAULT_MAX_MESSAGES: i32 = 10;
/// Default long-poll wait in seconds
pub const DEFAULT_WAIT_TIME_SECONDS: i32 = 20;
/// Default visibility timeout in seconds
pub const DEFAULT_VISIBILITY_TIMEOUT: i32 = 30;
/// Default time in-flight dispatches get to finish on shutdown
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// SQS hard limits
const MAX_BATCH_SIZE: i32 = 10;
const MAX_WAIT_TIME_SECONDS: i32 = 20;
const MAX_VISIBILITY_TIMEOUT: i32 = 43_200;

/// What a loop does when deleting or releasing a message fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the loop and fail the consumer
    #[default]
    Fatal,
    /// Log the failure and keep consuming; the message comes back after its
    /// visibility timeout
    LogAndContinue,
}

/// Retry schedule for failed receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first failed attempt, zero makes receive failures fatal
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the doubling delay
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// No retries
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
        }
    }

    /// Exponential backoff starting at 100ms, capped at 30s
    #[must_use]
    pub const fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::none()
        }
    }

    /// Delay before retry number `attempt` (starting at 1)
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// Per-consumer configuration
#[derive(Clone)]
pub struct ConsumerConfig {
    /// Queue name, or name prefix when `prefix_based` is set
    pub queue_name: String,
    /// Called for every received message
    pub handler: Arc<dyn MessageHandler>,
    /// Consume every queue whose name starts with `queue_name`
    pub prefix_based: bool,
    /// Messages per receive (1..=10)
    pub max_messages: i32,
    /// Long-poll wait in seconds (0..=20)
    pub wait_time_seconds: i32,
    /// Seconds a received message stays hidden
    pub visibility_timeout: i32,
    /// Reaction to failed acknowledge/release calls
    pub failure_policy: FailurePolicy,
    /// Retry schedule for failed receives
    pub receive_retry: RetryConfig,
    /// Cap on concurrent dispatches per queue, unbounded when `None`
    pub max_in_flight: Option<usize>,
    /// Deadline for a single handler call; expiry releases the message
    pub handler_timeout: Option<Duration>,
    /// Time in-flight dispatches get to finish on shutdown
    pub drain_timeout: Duration,
}

impl ConsumerConfig {
    /// Creates a configuration with the default receive settings
    pub fn new(queue_name: impl Into<String>, handler: impl MessageHandler + 'static) -> Self {
        Self::with_shared_handler(queue_name, Arc::new(handler))
    }

    /// Creates a configuration around a handler shared with other consumers
    pub fn with_shared_handler(
        queue_name: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            handler,
            prefix_based: false,
            max_messages: DEFAULT_MAX_MESSAGES,
            wait_time_seconds: DEFAULT_WAIT_TIME_SECONDS,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            failure_policy: FailurePolicy::default(),
            receive_retry: RetryConfig::default(),
            max_in_flight: None,
            handler_timeout: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Treats the queue name as a prefix
    #[must_use]
    pub fn prefix_based(mut self, prefix_based: bool) -> Self {
        self.prefix_based = prefix_based;
        self
    }

    /// Sets the batch size
    #[must_use]
    pub fn max_messages(mut self, max_messages: i32) -> Self {
        self.max_messages = max_messages;
        self
    }

    /// Sets the long-poll wait
    #[must_use]
    pub fn wait_time_seconds(mut self, wait_time_seconds: i32) -> Self {
        self.wait_time_seconds = wait_time_seconds;
        self
    }

    /// Sets the visibility timeout
    #[must_use]
    pub fn visibility_timeout(mut self, visibility_timeout: i32) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }

    /// Sets the acknowledge/release failure policy
    #[must_use]
    pub fn failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Sets the receive retry schedule
    #[must_use]
    pub fn receive_retry(mut self, receive_retry: RetryConfig) -> Self {
        self.receive_retry = receive_retry;
        self
    }

    /// Caps concurrent dispatches per queue
    #[must_use]
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight);
        self
    }

    /// Sets a per-message handler deadline
    #[must_use]
    pub fn handler_timeout(mut self, handler_timeout: Duration) -> Self {
        self.handler_timeout = Some(handler_timeout);
        self
    }

    /// Sets how long shutdown waits for in-flight dispatches
    #[must_use]
    pub fn drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Checks the settings against SQS limits
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_name.trim().is_empty() {
            return Err(ConfigError::MissingQueueName);
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.max_messages) {
            return Err(ConfigError::InvalidBatchSize(self.max_messages));
        }
        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&self.wait_time_seconds) {
            return Err(ConfigError::InvalidWaitTime(self.wait_time_seconds));
        }
        if !(0..=MAX_VISIBILITY_TIMEOUT).contains(&self.visibility_timeout) {
            return Err(ConfigError::InvalidVisibilityTimeout(
                self.visibility_timeout,
            ));
        }
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::ZeroMaxInFlight);
        }
        Ok(())
    }

    /// Receive parameters derived from this configuration
    #[must_use]
    pub const fn receive_settings(&self) -> ReceiveSettings {
        ReceiveSettings {
            max_messages: self.max_messages,
            wait_time_seconds: self.wait_time_seconds,
            visibility_timeout: self.visibility_timeout,
        }
    }
}

impl fmt::Debug for ConsumerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerConfig")
            .field("queue_name", &self.queue_name)
            .field("prefix_based", &self.prefix_based)
            .field("max_messages", &self.max_messages)
            .field("wait_time_seconds", &self.wait_time_seconds)
            .field("visibility_timeout", &self.visibility_timeout)
            .field("failure_policy", &self.failure_policy)
            .field("receive_retry", &self.receive_retry)
            .field("max_in_flight", &self.max_in_flight)
            .field("handler_timeout", &self.handler_timeout)
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}
