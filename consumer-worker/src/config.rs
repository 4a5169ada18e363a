//! Command line and file configuration for the worker

use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use serde::Deserialize;
use sqs_consumer::{
    consumer::{DEFAULT_MAX_MESSAGES, DEFAULT_VISIBILITY_TIMEOUT, DEFAULT_WAIT_TIME_SECONDS},
    ConsumerConfig, FailurePolicy, MessageHandler, RetryConfig,
};

/// Command line arguments
///
/// The queue flags describe one consumer; more can be listed in the
/// `--config` file.
#[derive(Debug, Parser)]
#[command(name = "consumer-worker", about = "Consumes SQS queues and logs every message")]
pub struct Args {
    /// Queue name, or name prefix with `--prefix-based`
    #[arg(long, env = "SQS_QUEUE_NAME")]
    pub queue_name: Option<String>,

    /// Treat the queue name as a prefix and consume every matching queue
    #[arg(long, env = "SQS_PREFIX_BASED")]
    pub prefix_based: bool,

    /// Messages per receive (1-10)
    #[arg(long, env = "SQS_MAX_MESSAGES", default_value_t = DEFAULT_MAX_MESSAGES)]
    pub max_messages: i32,

    /// Long-poll wait in seconds (0-20)
    #[arg(long, env = "SQS_WAIT_TIME_SECONDS", default_value_t = DEFAULT_WAIT_TIME_SECONDS)]
    pub wait_time_seconds: i32,

    /// Visibility timeout of received messages in seconds
    #[arg(long, env = "SQS_VISIBILITY_TIMEOUT", default_value_t = DEFAULT_VISIBILITY_TIMEOUT)]
    pub visibility_timeout: i32,

    /// Stop the consumer when a delete or visibility change fails
    #[arg(long, env = "SQS_FAIL_ON_ACK_ERROR", default_value_t = true, action = ArgAction::Set)]
    pub fail_on_ack_error: bool,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Custom SQS endpoint, e.g. `LocalStack`
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// TOML file with additional consumers
    #[arg(long, env = "CONSUMER_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Consumer described by the queue flags, if a queue name was given
    #[must_use]
    pub fn consumer_settings(&self) -> Option<ConsumerSettings> {
        let queue_name = self.queue_name.clone()?;

        Some(ConsumerSettings {
            queue_name,
            prefix_based: self.prefix_based,
            max_messages: self.max_messages,
            wait_time_seconds: self.wait_time_seconds,
            visibility_timeout: self.visibility_timeout,
            fail_on_ack_error: self.fail_on_ack_error,
            ..ConsumerSettings::default()
        })
    }
}

/// Worker configuration file
///
/// ```toml
/// region = "eu-west-1"
///
/// [[consumers]]
/// queue_name = "orders-"
/// prefix_based = true
/// max_in_flight = 50
/// ```
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// AWS region
    pub region: Option<String>,
    /// Custom SQS endpoint
    pub endpoint_url: Option<String>,
    /// Consumers to run
    #[serde(default)]
    pub consumers: Vec<ConsumerSettings>,
}

/// Settings of one consumer
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerSettings {
    /// Queue name, or name prefix when `prefix_based` is set
    pub queue_name: String,
    /// Consume every queue whose name starts with `queue_name`
    pub prefix_based: bool,
    /// Messages per receive
    pub max_messages: i32,
    /// Long-poll wait in seconds
    pub wait_time_seconds: i32,
    /// Visibility timeout of received messages in seconds
    pub visibility_timeout: i32,
    /// Stop the consumer when a delete or visibility change fails
    pub fail_on_ack_error: bool,
    /// Receive retries before the consumer gives up
    pub receive_retries: u32,
    /// Cap on concurrently handled messages per queue
    pub max_in_flight: Option<usize>,
    /// Handlers running longer than this are treated as failed
    pub handler_timeout_seconds: Option<u64>,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            queue_name: String::new(),
            prefix_based: false,
            max_messages: DEFAULT_MAX_MESSAGES,
            wait_time_seconds: DEFAULT_WAIT_TIME_SECONDS,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            fail_on_ack_error: true,
            receive_retries: 0,
            max_in_flight: None,
            handler_timeout_seconds: None,
        }
    }
}

impl ConsumerSettings {
    /// Builds the consumer configuration around a shared handler
    #[must_use]
    pub fn into_consumer_config(self, handler: Arc<dyn MessageHandler>) -> ConsumerConfig {
        let failure_policy = if self.fail_on_ack_error {
            FailurePolicy::Fatal
        } else {
            FailurePolicy::LogAndContinue
        };

        let mut config = ConsumerConfig::with_shared_handler(self.queue_name, handler)
            .prefix_based(self.prefix_based)
            .max_messages(self.max_messages)
            .wait_time_seconds(self.wait_time_seconds)
            .visibility_timeout(self.visibility_timeout)
            .failure_policy(failure_policy)
            .receive_retry(RetryConfig::exponential(self.receive_retries));

        if let Some(max_in_flight) = self.max_in_flight {
            config = config.max_in_flight(max_in_flight);
        }
        if let Some(seconds) = self.handler_timeout_seconds {
            config = config.handler_timeout(Duration::from_secs(seconds));
        }

        config
    }
}

impl WorkerConfig {
    /// Parses a TOML configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid configuration
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("Invalid worker configuration")
    }

    /// Merges the configuration file (if any) with the command line
    ///
    /// Command line region and endpoint win over the file; the queue flags
    /// add one more consumer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if no
    /// consumer is configured
    pub fn resolve(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Self::parse(&contents)?
            }
            None => Self::default(),
        };

        if args.region.is_some() {
            config.region.clone_from(&args.region);
        }
        if args.endpoint_url.is_some() {
            config.endpoint_url.clone_from(&args.endpoint_url);
        }
        config.consumers.extend(args.consumer_settings());

        if config.consumers.is_empty() {
            bail!("No consumers configured, pass --queue-name or --config");
        }

        Ok(config)
    }
}
