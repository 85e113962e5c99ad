use thiserror::Error;

use crate::{BackendError, OrderId};

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists under the order's key.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// A record already exists under the order's key.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// A record exists but could not be decoded.
    #[error("Corrupt record at {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The order could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The request exceeded its deadline.
    #[error("Request timed out")]
    Timeout,

    /// The index set and the records it points at disagree.
    #[error("Index and records diverged: {0}")]
    Invariant(String),

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(BackendError),
}

impl StoreError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::AlreadyExists(_) => "already_exists",
            StoreError::Corrupt { .. } => "corrupt",
            StoreError::Serialization(_) => "serialization",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Timeout => "timeout",
            StoreError::Invariant(_) => "invariant",
            StoreError::Backend(_) => "backend",
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => StoreError::Unavailable(msg),
            BackendError::Timeout => StoreError::Timeout,
            other => StoreError::Backend(other),
        }
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
