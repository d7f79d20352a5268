//! Settlement store error types.

use thiserror::Error;

use liquida_shared::types::SettlementId;

/// Errors returned by a [`SettlementStore`](super::SettlementStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No settlement with this ID.
    #[error("settlement {0} not found")]
    NotFound(SettlementId),

    /// A settlement with this ID already exists.
    #[error("settlement {0} already exists")]
    AlreadyExists(SettlementId),

    /// The stored version moved on since the caller loaded it.
    #[error("version conflict: expected {expected}, stored {actual}")]
    Conflict {
        /// Version the caller based its change on.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// The store could not be reached or refused the write.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
