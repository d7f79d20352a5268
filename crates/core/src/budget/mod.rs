//! Funding reconciliation of invoices and payments against a declared total.

pub mod service;
pub mod types;


pub use service::ReconciliationService;
pub use types::{BudgetSnapshot, FundingState};
