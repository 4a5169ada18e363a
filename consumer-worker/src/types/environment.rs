//! Environment configuration for different deployment stages

use std::{env, time::Duration};

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Region};

/// Region used when neither the config nor the AWS provider chain names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Returns the endpoint URL to use for AWS services
    #[must_use]
    pub const fn override_aws_endpoint_url(&self) -> Option<&str> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            // LocalStack endpoint for development
            Self::Development => Some("http://localhost:4566"),
        }
    }

    /// Whether logs are emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// AWS configuration with retry and timeout settings
    ///
    /// An explicit `region` or `endpoint_url` wins over the provider chain
    /// and the environment default.
    pub async fn aws_config(
        &self,
        region: Option<&str>,
        endpoint_url: Option<&str>,
    ) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let loaded = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let region = region
            .map(|region| Region::new(region.to_string()))
            .or_else(|| loaded.region().cloned())
            .unwrap_or_else(|| Region::new(DEFAULT_REGION));

        let mut config_builder = loaded
            .to_builder()
            .region(region)
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = endpoint_url.or_else(|| self.override_aws_endpoint_url()) {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }
}
