//! Invoice error types.

use thiserror::Error;

use crate::validation::{FieldError, summarize};

/// Errors raised while turning caller input into an [`Invoice`](super::Invoice).
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// One or more rules failed.
    #[error("invalid invoice: {}", summarize(.0))]
    Invalid(Vec<FieldError>),

    /// The authorization-code catalog is missing or empty.
    #[error("authorization code catalog is not configured")]
    MissingCatalog,
}
