//! Workflow error types for the settlement lifecycle.
//!
//! `GuardViolation` describes why a transition or mutation was refused;
//! `WorkflowError` is what every `SettlementService` operation returns.

use thiserror::Error;

use liquida_shared::AppError;

use crate::audit::AuditError;
use crate::budget::FundingState;
use crate::invoice::InvoiceError;
use crate::payment::PaymentError;
use crate::settlement::StoreError;
use crate::validation::{FieldError, summarize};
use crate::workflow::types::{CorrectableField, Role, WorkflowEvent, WorkflowState};

/// A refused transition or mutation. State is unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardViolation {
    /// The event is not allowed from the current state.
    #[error("Cannot {event} a settlement in state {from}")]
    InvalidTransition {
        /// Current state.
        from: WorkflowState,
        /// Attempted event.
        event: WorkflowEvent,
    },

    /// Only the owner may perform this operation.
    #[error("Only the settlement owner can do this")]
    NotOwner,

    /// The actor's role is too low.
    #[error("Role {actual} does not meet required role {required}")]
    InsufficientRole {
        /// Required role.
        required: Role,
        /// Actor's role.
        actual: Role,
    },

    /// Submitting a settlement without invoices.
    #[error("At least one invoice is required")]
    NoInvoices,

    /// Funding must be complete for this event.
    #[error("Funding must be completo, currently {state}")]
    FundingNotComplete {
        /// Current funding state.
        state: FundingState,
    },

    /// A comment is required for this event.
    #[error("A comment is required")]
    CommentRequired,

    /// A correction request must name at least one field.
    #[error("A correction request must name at least one field")]
    NoCorrectionFields,

    /// Resubmitting without changing any field named in the correction request.
    #[error("No requested field was corrected")]
    NoCorrectionChanges,

    /// Settling without a disbursement reference.
    #[error("Disbursement confirmation reference is required")]
    MissingDisbursementReference,

    /// Invoices and payments are frozen in this state.
    #[error("Settlement is frozen in state {state}")]
    SettlementFrozen {
        /// Current state.
        state: WorkflowState,
    },

    /// The field is not open in the current correction request.
    #[error("Field {field} is not open for correction")]
    FieldNotUnderCorrection {
        /// Field the mutation touches.
        field: CorrectableField,
    },
}

impl GuardViolation {
    /// Returns true if the refusal is about who the actor is, not the settlement.
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::NotOwner | Self::InsufficientRole { .. })
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotOwner => "NOT_OWNER",
            Self::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            Self::NoInvoices => "NO_INVOICES",
            Self::FundingNotComplete { .. } => "FUNDING_NOT_COMPLETE",
            Self::CommentRequired => "COMMENT_REQUIRED",
            Self::NoCorrectionFields => "NO_CORRECTION_FIELDS",
            Self::NoCorrectionChanges => "NO_CORRECTION_CHANGES",
            Self::MissingDisbursementReference => "MISSING_DISBURSEMENT_REFERENCE",
            Self::SettlementFrozen { .. } => "SETTLEMENT_FROZEN",
            Self::FieldNotUnderCorrection { .. } => "FIELD_NOT_UNDER_CORRECTION",
        }
    }
}

/// Errors returned by settlement operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Field-level validation failed. State unchanged.
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// A guard refused the operation. State unchanged.
    #[error(transparent)]
    Guard(#[from] GuardViolation),

    /// The settlement changed since the caller loaded it. Reload and retry.
    #[error("Settlement was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        /// Version the caller based its change on.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Settlement, invoice or payment not found.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The partner directory failed. Retryable.
    #[error("Partner lookup failed: {0}")]
    Lookup(String),

    /// Save or append failed; the change was rolled back.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Deployment defect: missing catalog, unknown payment method.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Creates a single-field validation error.
    #[must_use]
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if repeating the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Lookup(_) | Self::Persistence(_)
        )
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Guard(g) if g.is_authorization() => 403,
            Self::Guard(_) => 422,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Lookup(_) => 502,
            Self::Persistence(_) | Self::Configuration(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Guard(g) => g.error_code(),
            Self::Conflict { .. } => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Lookup(_) => "LOOKUP_FAILURE",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<InvoiceError> for WorkflowError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::Invalid(errors) => Self::Validation(errors),
            InvoiceError::MissingCatalog => Self::Configuration(err.to_string()),
        }
    }
}

impl From<PaymentError> for WorkflowError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Invalid(errors) => Self::Validation(errors),
            PaymentError::UnknownMethod(_) => Self::Configuration(err.to_string()),
            PaymentError::Lookup(message) => Self::Lookup(message),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::not_found("Settlement", id),
            StoreError::Conflict { expected, actual } => Self::Conflict { expected, actual },
            StoreError::AlreadyExists(_) | StoreError::Unavailable(_) => {
                Self::Persistence(err.to_string())
            }
        }
    }
}

impl From<AuditError> for WorkflowError {
    fn from(err: AuditError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::Validation(_) => Self::Validation(message),
            WorkflowError::Guard(g) if g.is_authorization() => Self::Forbidden(message),
            WorkflowError::Guard(_) => Self::BusinessRule(message),
            WorkflowError::Conflict { .. } => Self::Conflict(message),
            WorkflowError::NotFound { .. } => Self::NotFound(message),
            WorkflowError::Lookup(_) => Self::ExternalService(message),
            WorkflowError::Persistence(_) => Self::Persistence(message),
            WorkflowError::Configuration(_) => Self::Configuration(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquida_shared::types::SettlementId;

    #[test]
    fn test_invalid_transition_error() {
        let err = WorkflowError::from(GuardViolation::InvalidTransition {
            from: WorkflowState::Draft,
            event: WorkflowEvent::Approve,
        });
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert!(err.to_string().contains("draft"));
        assert!(err.to_string().contains("approve"));
    }

    #[test]
    fn test_role_errors_are_forbidden() {
        let err = WorkflowError::from(GuardViolation::InsufficientRole {
            required: Role::Authorizer,
            actual: Role::Reviewer,
        });
        assert_eq!(err.status_code(), 403);
        assert!(matches!(AppError::from(err), AppError::Forbidden(_)));

        let err = WorkflowError::from(GuardViolation::NotOwner);
        assert_eq!(err.error_code(), "NOT_OWNER");
    }

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let err = WorkflowError::from(StoreError::Conflict {
            expected: 3,
            actual: 4,
        });
        assert_eq!(err.status_code(), 409);
        assert!(err.is_retryable());
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }

    #[test]
    fn test_store_not_found() {
        let id = SettlementId::new();
        let err = WorkflowError::from(StoreError::NotFound(id));
        assert_eq!(err.status_code(), 404);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_unknown_payment_method_is_configuration() {
        let err = WorkflowError::from(PaymentError::UnknownMethod("crypto".to_string()));
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_lookup_is_retryable() {
        let err = WorkflowError::from(PaymentError::Lookup("timeout".to_string()));
        assert_eq!(err.status_code(), 502);
        assert!(err.is_retryable());
        assert!(matches!(AppError::from(err), AppError::ExternalService(_)));
    }

    #[test]
    fn test_validation_lists_fields() {
        let err = WorkflowError::invalid("total_amount", "must be greater than 0.01");
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("total_amount"));
    }
}
