//! Payment error types.

use thiserror::Error;

use crate::validation::{FieldError, summarize};

/// Errors raised while capturing a payment or resolving a deposit account.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Captured fields failed validation.
    #[error("invalid payment: {}", summarize(.0))]
    Invalid(Vec<FieldError>),

    /// The payment method tag is not one of the supported methods.
    #[error("unknown payment method: {0}")]
    UnknownMethod(String),

    /// The partner directory could not be reached. Retryable.
    #[error("partner lookup failed: {0}")]
    Lookup(String),
}

impl PaymentError {
    /// Creates a single-field validation error.
    #[must_use]
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid(vec![FieldError::new(field, message)])
    }
}
