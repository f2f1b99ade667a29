//! Error types for `kiln-kdf`.

use thiserror::Error;

/// Errors produced by key derivation operations.
#[derive(Debug, Error)]
pub enum KdfError {
    /// A caller-supplied argument was rejected before any state was touched
    /// (zero iteration count, bad key length, precision outside `0..=10`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The CPU-time source could not be read. Fatal for the running
    /// time-bounded operation.
    #[error("CPU clock error: {0}")]
    CpuClock(String),

    /// The dedicated derivation thread could not be started.
    #[error("worker thread error: {0}")]
    Worker(String),

    /// The OS random number generator failed.
    #[error("random generator error: {0}")]
    Rng(String),
}

/// Terminal status of an unsuccessful [`Pbkdf2::search`](crate::Pbkdf2::search).
#[derive(Debug, Error)]
pub enum SearchError<E> {
    /// The time budget ran out before the predicate reported a match.
    #[error("key search timeout")]
    Timeout,

    /// The predicate aborted the search with its own signal.
    #[error("key search aborted: {0}")]
    Aborted(E),

    /// The derivation itself failed.
    #[error(transparent)]
    Kdf(#[from] KdfError),
}

impl<E> SearchError<E> {
    /// Returns `true` if the search ran out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
