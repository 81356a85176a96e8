//! Connector Framework error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (usually transient)
    /// Failed to establish connection to the directory.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network error during communication.
    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Authentication errors (permanent)
    /// Invalid credentials provided.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    // Configuration errors (permanent)
    /// Connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A changelog sequence number could not be read from the directory.
    #[error("changelog number unavailable: attribute '{attribute}' is missing")]
    ChangeLogNumberMissing { attribute: String },

    // Operation errors
    /// Operation failed.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid data format.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// A lookup that must resolve at most one entry matched several.
    #[error("ambiguous entry: {count} entries match {filter} under {base}")]
    AmbiguousEntry {
        base: String,
        filter: String,
        count: usize,
    },

    // Synchronization errors
    /// A changelog page could not be fetched; the run ended early.
    #[error("synchronization interrupted after token {last_token:?}: {message}")]
    SyncInterrupted {
        last_token: Option<i64>,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization error.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ConnectorError {
    /// Check if this error is transient and the operation should be retried.
    ///
    /// Transient errors are those caused by temporary conditions that may resolve
    /// themselves, such as network issues or temporary unavailability.
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::ConnectionFailed { .. }
            | ConnectorError::NetworkError { .. }
            | ConnectorError::SyncInterrupted { .. } => true,
            _ => false,
        }
    }

    /// Check if this error is permanent and retry won't help.
    ///
    /// Permanent errors require human intervention or configuration changes.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::NetworkError { .. } => "NETWORK_ERROR",
            ConnectorError::AuthenticationFailed => "AUTH_FAILED",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::ChangeLogNumberMissing { .. } => "CHANGELOG_NUMBER_MISSING",
            ConnectorError::OperationFailed { .. } => "OPERATION_FAILED",
            ConnectorError::InvalidData { .. } => "INVALID_DATA",
            ConnectorError::AmbiguousEntry { .. } => "AMBIGUOUS_ENTRY",
            ConnectorError::SyncInterrupted { .. } => "SYNC_INTERRUPTED",
            ConnectorError::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        ConnectorError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a missing changelog number error.
    pub fn change_log_number_missing(attribute: impl Into<String>) -> Self {
        ConnectorError::ChangeLogNumberMissing {
            attribute: attribute.into(),
        }
    }

    /// Wrap a page-level failure into a [`ConnectorError::SyncInterrupted`].
    ///
    /// The cause is kept as the source.
    pub fn sync_interrupted(last_token: Option<i64>, cause: ConnectorError) -> Self {
        ConnectorError::SyncInterrupted {
            last_token,
            message: cause.to_string(),
            source: Some(Box::new(cause)),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        ConnectorError::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
