//! Settlement data types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use liquida_shared::types::{BudgetId, Currency, SettlementId, UserId};

use crate::audit::FieldChange;
use crate::budget::{BudgetSnapshot, ReconciliationService};
use crate::invoice::Invoice;
use crate::payment::Payment;
use crate::workflow::types::{CorrectableField, WorkflowState};

/// Input for creating a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSettlementInput {
    /// Budget the settlement is drawn against.
    pub budget_id: BudgetId,
    /// Declared total amount.
    pub declared_total: Decimal,
    /// Optional description.
    pub description: Option<String>,
}

/// Correction request currently open on a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRequest {
    /// Fields the owner may change.
    pub fields: BTreeSet<CorrectableField>,
    /// Reviewer comment.
    pub comment: String,
    /// Reviewer who opened the request.
    pub requested_by: UserId,
    /// When the request was opened.
    pub requested_at: DateTime<Utc>,
}

impl CorrectionRequest {
    /// Returns true if `field` is open for correction.
    #[must_use]
    pub fn allows(&self, field: CorrectableField) -> bool {
        self.fields.contains(&field)
    }
}

/// An expense settlement (liquidación).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Settlement ID.
    pub id: SettlementId,
    /// Owning user.
    pub owner_id: UserId,
    /// Budget the settlement is drawn against.
    pub budget_id: BudgetId,
    /// Optional description.
    pub description: Option<String>,
    /// Declared total amount.
    pub declared_total: Decimal,
    /// Settlement currency.
    pub currency: Currency,
    /// Attached invoices, in insertion order.
    pub invoices: Vec<Invoice>,
    /// Attached payments, in insertion order.
    pub payments: Vec<Payment>,
    /// Current workflow state.
    pub state: WorkflowState,
    /// Optimistic concurrency version. Bumped by every mutation and transition.
    pub version: u64,
    /// Open correction request, while in `CorrectionRequested`.
    pub open_correction: Option<CorrectionRequest>,
    /// Changes made since the last revision entry.
    pub pending_changes: Vec<FieldChange>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Creates a draft settlement at version 0.
    #[must_use]
    pub fn new(owner_id: UserId, input: CreateSettlementInput, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: SettlementId::new(),
            owner_id,
            budget_id: input.budget_id,
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            declared_total: input.declared_total,
            currency,
            invoices: Vec::new(),
            payments: Vec::new(),
            state: WorkflowState::Draft,
            version: 0,
            open_correction: None,
            pending_changes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Funding snapshot of the attached invoices.
    #[must_use]
    pub fn snapshot(&self) -> BudgetSnapshot {
        ReconciliationService::reconcile(self.declared_total, &self.invoices)
    }

    /// Sum of attached payments.
    #[must_use]
    pub fn paid_total(&self) -> Decimal {
        ReconciliationService::paid_total(&self.payments)
    }

    /// Returns true if `user_id` owns the settlement.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// Records a change and bumps the version.
    pub(crate) fn touch(&mut self, changes: impl IntoIterator<Item = FieldChange>) {
        self.pending_changes.extend(changes);
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::FundingState;
    use rust_decimal_macros::dec;

    fn settlement() -> Settlement {
        Settlement::new(
            UserId::new(),
            CreateSettlementInput {
                budget_id: BudgetId::new(),
                declared_total: dec!(500.00),
                description: Some("  Viaje a Xela  ".to_string()),
            },
            Currency::Gtq,
        )
    }

    #[test]
    fn test_new_settlement_is_empty_draft() {
        let s = settlement();
        assert_eq!(s.state, WorkflowState::Draft);
        assert_eq!(s.version, 0);
        assert_eq!(s.description.as_deref(), Some("Viaje a Xela"));
        assert!(s.invoices.is_empty());
        assert_eq!(s.snapshot().funding_state, FundingState::Incomplete);
        assert_eq!(s.paid_total(), Decimal::ZERO);
    }

    #[test]
    fn test_touch_bumps_version() {
        let mut s = settlement();
        let before = s.updated_at;
        s.touch([FieldChange::new(
            CorrectableField::Invoices,
            "invoices[FAC-1]",
            None,
            Some("FAC-1".to_string()),
        )]);
        assert_eq!(s.version, 1);
        assert_eq!(s.pending_changes.len(), 1);
        assert!(s.updated_at >= before);
    }
}
