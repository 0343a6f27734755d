//! Error types for the key record store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a store backend can surface.
///
/// Expected business outcomes (unknown key, capacity reached, ...) are never
/// store errors; a missing record is `Ok(None)`. These variants all mean the
/// backend itself failed, which callers treat as fatal for the request.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed or is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
