//! Error types for the license engine.

use keygate_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Fatal engine errors.
///
/// Expected refusals (unknown key, expired, capacity reached, wrong secret,
/// missing field) are not here; they travel as [`crate::Denial`] inside
/// ordinary responses. An `EngineError` means the store could not answer, the
/// one condition that aborts a request. The engine never retries it; retry
/// policy belongs to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The store call failed.
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),

    /// The store did not answer within the configured deadline.
    #[error("store timed out after {0:?}")]
    StoreTimeout(Duration),
}
