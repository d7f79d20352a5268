//! Workflow domain types for the settlement lifecycle.
//!
//! Settlements progress through these states:
//! - Draft → Submitted (submit)
//! - Submitted → UnderReview (begin review)
//! - UnderReview → CorrectionRequested (request correction)
//! - UnderReview → Approved (approve)
//! - UnderReview → Rejected (reject)
//! - CorrectionRequested → Submitted (resubmit)
//! - Approved → Settled (settle)
//! - Rejected → Draft (reopen, administrative)

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use liquida_shared::types::UserId;

use crate::audit::RevisionEntry;
use crate::settlement::Settlement;

/// Settlement state in the review workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Being prepared by the owner; invoices and payments are editable.
    Draft,
    /// Handed in, waiting for a reviewer.
    Submitted,
    /// A reviewer is working on it.
    UnderReview,
    /// Sent back to the owner with a list of fields to fix.
    CorrectionRequested,
    /// Authorized for disbursement.
    Approved,
    /// Refused by a reviewer.
    Rejected,
    /// Disbursed (terminal).
    Settled,
}

impl WorkflowState {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::CorrectionRequested,
        Self::Approved,
        Self::Rejected,
        Self::Settled,
    ];

    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::CorrectionRequested => "correction_requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Settled => "settled",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s.trim().to_lowercase())
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event that drives a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Owner hands in a draft.
    Submit,
    /// Reviewer picks up a submitted settlement.
    BeginReview,
    /// Reviewer sends it back for corrections.
    RequestCorrection,
    /// Authorizer approves it.
    Approve,
    /// Reviewer rejects it.
    Reject,
    /// Owner hands in the corrected settlement.
    Resubmit,
    /// Authorizer records the disbursement.
    Settle,
    /// Administrator reopens a rejected settlement as a draft.
    Reopen,
}

impl WorkflowEvent {
    /// Returns the string representation of the event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::BeginReview => "begin_review",
            Self::RequestCorrection => "request_correction",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Resubmit => "resubmit",
            Self::Settle => "settle",
            Self::Reopen => "reopen",
        }
    }

    /// State reached when the event is applied.
    #[must_use]
    pub fn target(&self) -> WorkflowState {
        match self {
            Self::Submit | Self::Resubmit => WorkflowState::Submitted,
            Self::BeginReview => WorkflowState::UnderReview,
            Self::RequestCorrection => WorkflowState::CorrectionRequested,
            Self::Approve => WorkflowState::Approved,
            Self::Reject => WorkflowState::Rejected,
            Self::Settle => WorkflowState::Settled,
            Self::Reopen => WorkflowState::Draft,
        }
    }
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields a reviewer can open for correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectableField {
    /// Adding or removing invoices.
    Invoices,
    /// Invoice document number.
    InvoiceDocumentNumber,
    /// Invoice issue date.
    InvoiceIssueDate,
    /// Invoice authorization number.
    InvoiceAuthorization,
    /// Invoice issuer name.
    InvoiceIssuer,
    /// Invoice amount.
    InvoiceAmount,
    /// Capturing or removing payments.
    Payments,
}

impl CorrectableField {
    /// Returns the string representation of the field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoices => "invoices",
            Self::InvoiceDocumentNumber => "invoice_document_number",
            Self::InvoiceIssueDate => "invoice_issue_date",
            Self::InvoiceAuthorization => "invoice_authorization",
            Self::InvoiceIssuer => "invoice_issuer",
            Self::InvoiceAmount => "invoice_amount",
            Self::Payments => "payments",
        }
    }
}

impl fmt::Display for CorrectableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Workflow role. Roles are ordered; a higher role can do everything a lower one can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Prepares and submits own settlements.
    Requester = 0,
    /// Reviews, requests corrections, rejects.
    Reviewer = 1,
    /// Approves and records disbursements.
    Authorizer = 2,
    /// Administrative edges such as reopening.
    Administrator = 3,
}

impl Role {
    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Reviewer => "reviewer",
            Self::Authorizer => "authorizer",
            Self::Administrator => "administrator",
        }
    }

    /// Parses a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "requester" => Some(Self::Requester),
            "reviewer" => Some(Self::Reviewer),
            "authorizer" => Some(Self::Authorizer),
            "administrator" | "admin" => Some(Self::Administrator),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User ID.
    pub user_id: UserId,
    /// Role the user acts with.
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Returns true if the actor's role is at least `required`.
    #[must_use]
    pub fn has_role(&self, required: Role) -> bool {
        self.role >= required
    }
}

/// Proof that the settled amount was disbursed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementConfirmation {
    /// Bank or treasury reference.
    pub reference: String,
    /// When the disbursement happened.
    pub confirmed_at: DateTime<Utc>,
}

/// A workflow command with its event-specific data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowCommand {
    /// Submit a draft.
    Submit,
    /// Start reviewing.
    BeginReview,
    /// Send back for corrections.
    RequestCorrection {
        /// Reviewer comment. Required.
        comment: String,
        /// Fields the owner may change.
        fields: BTreeSet<CorrectableField>,
    },
    /// Approve.
    Approve {
        /// Optional approval note.
        comment: Option<String>,
    },
    /// Reject.
    Reject {
        /// Rejection reason. Required.
        comment: String,
    },
    /// Resubmit after corrections.
    Resubmit {
        /// Optional note for the reviewer.
        comment: Option<String>,
    },
    /// Record the disbursement.
    Settle {
        /// Disbursement proof.
        confirmation: DisbursementConfirmation,
    },
    /// Reopen a rejected settlement.
    Reopen {
        /// Optional reason.
        comment: Option<String>,
    },
}

impl WorkflowCommand {
    /// Event fired by this command.
    #[must_use]
    pub fn event(&self) -> WorkflowEvent {
        match self {
            Self::Submit => WorkflowEvent::Submit,
            Self::BeginReview => WorkflowEvent::BeginReview,
            Self::RequestCorrection { .. } => WorkflowEvent::RequestCorrection,
            Self::Approve { .. } => WorkflowEvent::Approve,
            Self::Reject { .. } => WorkflowEvent::Reject,
            Self::Resubmit { .. } => WorkflowEvent::Resubmit,
            Self::Settle { .. } => WorkflowEvent::Settle,
            Self::Reopen { .. } => WorkflowEvent::Reopen,
        }
    }

    /// Comment recorded in the revision entry, if any.
    #[must_use]
    pub fn comment(&self) -> Option<String> {
        match self {
            Self::Submit | Self::BeginReview => None,
            Self::RequestCorrection { comment, .. } | Self::Reject { comment } => {
                Some(comment.trim().to_string())
            }
            Self::Approve { comment } | Self::Resubmit { comment } | Self::Reopen { comment } => {
                comment
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
            }
            Self::Settle { confirmation } => {
                Some(format!("disbursement {}", confirmation.reference.trim()))
            }
        }
    }
}

/// Result of a transition request.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The transition was applied and recorded.
    Applied {
        /// Settlement after the transition.
        settlement: Settlement,
        /// The recorded revision.
        revision: RevisionEntry,
    },
    /// The same event already moved the settlement to its target state;
    /// nothing was recorded.
    NoChange {
        /// Current settlement.
        settlement: Settlement,
    },
}

impl TransitionOutcome {
    /// Settlement after the request.
    #[must_use]
    pub fn settlement(&self) -> &Settlement {
        match self {
            Self::Applied { settlement, .. } | Self::NoChange { settlement } => settlement,
        }
    }

    /// Returns true if a transition was recorded.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}
