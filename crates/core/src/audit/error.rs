//! Audit trail error types.

use thiserror::Error;

use crate::settlement::StoreError;
use crate::workflow::types::WorkflowState;

/// Errors raised by the audit trail.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An entry does not continue from the state the previous entries lead to.
    #[error("revision {sequence} starts from {found}, expected {expected}")]
    BrokenChain {
        /// Sequence of the offending entry.
        sequence: u64,
        /// State reached by the entries before it.
        expected: WorkflowState,
        /// Prior state recorded in the entry.
        found: WorkflowState,
    },
}
