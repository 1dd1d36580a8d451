//! Error types for the entity store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A query could not be evaluated by the backing store.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// The store backing a handle or live query has been torn down.
    #[error("Store is no longer available")]
    Unavailable,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
