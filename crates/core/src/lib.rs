//! Core business logic for Liquida.
//!
//! This crate contains the settlement reconciliation and workflow engine with
//! ZERO web or database dependencies. Persistence and the partner directory are
//! consumed through traits implemented by the surrounding system.
//!
//! # Modules
//!
//! - `validation` - Field-level validation errors shared by all validators
//! - `invoice` - Invoice validation and the authorization-code catalog
//! - `payment` - Payment method capture and the deposit partner search flow
//! - `budget` - Funding reconciliation of invoices against the declared total
//! - `settlement` - Settlement aggregate and the persistence boundary
//! - `audit` - Append-only revision trail
//! - `workflow` - Settlement lifecycle state machine and the service facade

pub mod audit;
pub mod budget;
pub mod invoice;
pub mod payment;
pub mod settlement;
pub mod validation;
pub mod workflow;

pub use workflow::{SettlementService, WorkflowError};
