//! Settlement workflow management.
//!
//! This module implements the settlement lifecycle state machine and the
//! service facade that ties validation, reconciliation, persistence and the
//! revision trail together.
//!
//! # Modules
//!
//! - `types` - Workflow domain types (WorkflowState, WorkflowEvent, Role)
//! - `error` - Guard violations and the service error type
//! - `machine` - Transition table and guards
//! - `service` - Caller-facing settlement operations

pub mod error;
pub mod machine;
pub mod service;
pub mod types;

#[cfg(test)]
mod machine_props;

pub use error::{GuardViolation, WorkflowError};
pub use machine::{Permission, StateMachine, TRANSITIONS};
pub use service::SettlementService;
pub use types::{
    Actor, CorrectableField, DisbursementConfirmation, Role, TransitionOutcome, WorkflowCommand,
    WorkflowEvent, WorkflowState,
};
