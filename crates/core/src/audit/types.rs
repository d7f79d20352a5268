//! Revision trail data types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use liquida_shared::types::{RevisionId, SettlementId, UserId};

use crate::workflow::types::{CorrectableField, WorkflowEvent, WorkflowState};

/// One changed field of an invoice or payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Correctable field the change falls under.
    pub field: CorrectableField,
    /// Path of the changed value, e.g. `invoices[FAC-1].total_amount`.
    pub path: String,
    /// Value before the change. `None` for additions.
    pub before: Option<String>,
    /// Value after the change. `None` for removals.
    pub after: Option<String>,
}

impl FieldChange {
    /// Creates a change record.
    #[must_use]
    pub fn new(
        field: CorrectableField,
        path: impl Into<String>,
        before: Option<String>,
        after: Option<String>,
    ) -> Self {
        Self {
            field,
            path: path.into(),
            before,
            after,
        }
    }
}

/// Immutable record of one workflow transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionEntry {
    /// Entry ID.
    pub id: RevisionId,
    /// Settlement the entry belongs to.
    pub settlement_id: SettlementId,
    /// Position in the settlement's trail, starting at 1.
    pub sequence: u64,
    /// Event that produced the transition.
    pub event: WorkflowEvent,
    /// State before the transition.
    pub prior_state: WorkflowState,
    /// State after the transition.
    pub new_state: WorkflowState,
    /// Acting user.
    pub actor: UserId,
    /// When the transition was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Optional comment.
    pub comment: Option<String>,
    /// Invoice and payment changes since the previous entry.
    pub changes: Vec<FieldChange>,
    /// Fields opened by a correction request. Empty for other events.
    pub correction_fields: BTreeSet<CorrectableField>,
    /// Settlement version the transition was applied to.
    pub applied_to_version: u64,
}
