//! Errors surfaced by [`Loader`](crate::Loader) operations.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by a [`BatchFunction`](crate::BatchFunction).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Loader errors.
///
/// `LoadError` is `Clone` so that a single batch failure can be handed to every request that
/// took part in the batch. The underlying fetch error is shared, not copied.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The key was rejected before it was queued.
    #[error("invalid key: {key}")]
    InvalidKey { key: String },

    /// The batch function failed for the batch this request belonged to.
    #[error("batch fetch failed: {0}")]
    Fetch(#[source] Arc<dyn StdError + Send + Sync + 'static>),

    /// The batch function did not complete within the configured timeout.
    #[error("batch fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The worker backing the loader has stopped.
    #[error("loader worker is no longer running")]
    WorkerClosed,
}

impl LoadError {
    pub fn invalid_key(key: &impl std::fmt::Debug) -> Self {
        Self::InvalidKey { key: format!("{key:?}") }
    }

    pub fn fetch(err: BoxError) -> Self {
        Self::Fetch(Arc::from(err))
    }

    /// Returns true if two errors came from the same failed batch.
    pub fn same_batch_failure(&self, other: &LoadError) -> bool {
        match (self, other) {
            (LoadError::Fetch(a), LoadError::Fetch(b)) => Arc::ptr_eq(a, b),
            (LoadError::Timeout(a), LoadError::Timeout(b)) => a == b,
            _ => false,
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;
