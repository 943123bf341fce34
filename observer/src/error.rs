//! Error types for the observer

use thiserror::Error;

use crate::ChainId;

/// Result type alias for observer operations
pub type Result<T> = std::result::Result<T, ObserverError>;

/// Error taxonomy for chain observation and relaying
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Connection failure on chain {chain}: {message}")]
    ConnectionFailure { chain: ChainId, message: String },

    #[error("Block range {from}..={to} on chain {chain} exceeds the endpoint limit of {limit} blocks")]
    RangeTooLarge {
        chain: ChainId,
        from: u64,
        to: u64,
        limit: u64,
    },

    #[error("Invalid block range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Unknown event signature: {topic}")]
    UnknownSignature { topic: String },

    #[error("Malformed {event} payload: {message}")]
    MalformedPayload { event: String, message: String },

    #[error("Submission to coordinating ledger failed: {message}")]
    SubmitFailure { message: String },

    #[error("Coordinating ledger error: {message}")]
    Coordinator { message: String },

    #[error("Watermark for chain {chain} cannot move back from {current} to {requested}")]
    WatermarkRegression {
        chain: ChainId,
        current: u64,
        requested: u64,
    },

    #[error("Invalid event schema: {message}")]
    InvalidSchema { message: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ObserverError {
    /// Create a new connection failure for a chain
    pub fn connection<S: Into<String>>(chain: &ChainId, message: S) -> Self {
        Self::ConnectionFailure {
            chain: chain.clone(),
            message: message.into(),
        }
    }

    /// Create a new malformed payload error
    pub fn malformed<E: Into<String>, S: Into<String>>(event: E, message: S) -> Self {
        Self::MalformedPayload {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Create a new submit failure
    pub fn submit<S: Into<String>>(message: S) -> Self {
        Self::SubmitFailure {
            message: message.into(),
        }
    }

    /// Create a new coordinating ledger error
    pub fn coordinator<S: Into<String>>(message: S) -> Self {
        Self::Coordinator {
            message: message.into(),
        }
    }

    /// Create a new schema error
    pub fn schema<S: Into<String>>(message: S) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is retryable on a later tick
    pub fn is_retryable(&self) -> bool {
        match self {
            ObserverError::ConnectionFailure { .. } => true,
            ObserverError::RangeTooLarge { .. } => true,
            ObserverError::SubmitFailure { .. } => true,
            ObserverError::Coordinator { .. } => true,
            _ => false,
        }
    }

    /// Check if this error only concerns a single log entry
    pub fn is_entry_level(&self) -> bool {
        matches!(
            self,
            ObserverError::UnknownSignature { .. }
                | ObserverError::MalformedPayload { .. }
                | ObserverError::SubmitFailure { .. }
        )
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ObserverError::InvalidChain(_) => "validation",
            ObserverError::Config(_) => "config",
            ObserverError::ConnectionFailure { .. } => "connection",
            ObserverError::RangeTooLarge { .. } => "range",
            ObserverError::InvalidRange { .. } => "range",
            ObserverError::UnknownSignature { .. } => "decode",
            ObserverError::MalformedPayload { .. } => "decode",
            ObserverError::SubmitFailure { .. } => "submit",
            ObserverError::Coordinator { .. } => "coordinator",
            ObserverError::WatermarkRegression { .. } => "watermark",
            ObserverError::InvalidSchema { .. } => "validation",
            ObserverError::InvalidAddress(_) => "validation",
            ObserverError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let chain = ChainId::new("goerli");

        let err = ObserverError::connection(&chain, "connection refused");
        assert!(err.is_retryable());
        assert!(!err.is_entry_level());
        assert_eq!(err.category(), "connection");
        assert!(err.to_string().contains("goerli"));

        let err = ObserverError::malformed("Deposit", "short payload");
        assert!(!err.is_retryable());
        assert!(err.is_entry_level());

        let err = ObserverError::submit("gateway returned 503");
        assert!(err.is_retryable());
        assert!(err.is_entry_level());
        assert_eq!(err.category(), "submit");
    }
}
