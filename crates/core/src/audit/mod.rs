//! Append-only revision trail of settlement transitions.

pub mod error;
pub mod trail;
pub mod types;

pub use error::AuditError;
pub use trail::{AuditTrail, History, replay};
pub use types::{FieldChange, RevisionEntry};
