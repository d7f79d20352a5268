//! Budget reconciliation data types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Funding state of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundingState {
    /// Invoiced total equals the declared total.
    #[serde(rename = "completo")]
    Complete,
    /// Invoiced total is below the declared total.
    #[serde(rename = "incompleto")]
    Incomplete,
    /// Invoiced total is above the declared total.
    #[serde(rename = "excedido")]
    Exceeded,
}

impl FundingState {
    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "completo",
            Self::Incomplete => "incompleto",
            Self::Exceeded => "excedido",
        }
    }
}

impl std::fmt::Display for FundingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived funding snapshot. Recomputed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    /// Number of attached invoices.
    pub invoice_count: usize,
    /// Sum of invoice amounts.
    pub invoiced_total: Decimal,
    /// Declared settlement amount.
    pub declared_total: Decimal,
    /// `declared_total - invoiced_total`. Negative when exceeded.
    pub difference: Decimal,
    /// Classification of the totals.
    pub funding_state: FundingState,
}

impl BudgetSnapshot {
    /// Returns true if the invoiced total matches the declared total exactly.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.funding_state == FundingState::Complete
    }
}
