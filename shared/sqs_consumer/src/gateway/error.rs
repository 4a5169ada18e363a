use thiserror::Error;

/// Boxed error coming from the queue backend
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error types for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The queue name could not be resolved to an address
    #[error("Failed to resolve queue address for '{name}'")]
    AddressResolution {
        /// Queue name that was looked up
        name: String,
        /// Backend error
        #[source]
        source: BoxError,
    },

    /// Queues could not be listed
    #[error("Failed to list queues with prefix '{prefix}'")]
    Discovery {
        /// Name prefix that was listed
        prefix: String,
        /// Backend error
        #[source]
        source: BoxError,
    },

    /// A batch could not be received
    #[error("Failed to receive messages from {address}")]
    Receive {
        /// Queue address
        address: String,
        /// Backend error
        #[source]
        source: BoxError,
    },

    /// A message could not be deleted
    #[error("Failed to acknowledge message on {address}")]
    Acknowledge {
        /// Queue address
        address: String,
        /// Backend error
        #[source]
        source: BoxError,
    },

    /// A message could not be made visible again
    #[error("Failed to release message on {address}")]
    Release {
        /// Queue address
        address: String,
        /// Backend error
        #[source]
        source: BoxError,
    },
}

impl GatewayError {
    /// Returns the name of the failed operation, used in logs and metrics
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::AddressResolution { .. } => "resolve_address",
            Self::Discovery { .. } => "list_addresses",
            Self::Receive { .. } => "receive_batch",
            Self::Acknowledge { .. } => "acknowledge",
            Self::Release { .. } => "release",
        }
    }
}
