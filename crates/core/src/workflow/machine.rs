//! Settlement transition table and guards.
//!
//! Pure: no I/O, no clock. The service loads the settlement, asks the machine
//! whether the command is allowed, and persists the result.

use crate::budget::FundingState;
use crate::settlement::Settlement;
use crate::workflow::error::GuardViolation;
use crate::workflow::types::{
    Actor, CorrectableField, Role, WorkflowCommand, WorkflowEvent, WorkflowState,
};

/// Every allowed `(from, event, to)` triple.
pub const TRANSITIONS: [(WorkflowState, WorkflowEvent, WorkflowState); 8] = [
    (WorkflowState::Draft, WorkflowEvent::Submit, WorkflowState::Submitted),
    (WorkflowState::Submitted, WorkflowEvent::BeginReview, WorkflowState::UnderReview),
    (
        WorkflowState::UnderReview,
        WorkflowEvent::RequestCorrection,
        WorkflowState::CorrectionRequested,
    ),
    (WorkflowState::UnderReview, WorkflowEvent::Approve, WorkflowState::Approved),
    (WorkflowState::UnderReview, WorkflowEvent::Reject, WorkflowState::Rejected),
    (
        WorkflowState::CorrectionRequested,
        WorkflowEvent::Resubmit,
        WorkflowState::Submitted,
    ),
    (WorkflowState::Approved, WorkflowEvent::Settle, WorkflowState::Settled),
    (WorkflowState::Rejected, WorkflowEvent::Reopen, WorkflowState::Draft),
];

/// Who may fire an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Only the settlement owner.
    Owner,
    /// Any actor with at least this role.
    Role(Role),
}

/// Stateless transition checker.
pub struct StateMachine;

impl StateMachine {
    /// Looks up the target state of `event` from `from`.
    #[must_use]
    pub fn next_state(from: WorkflowState, event: WorkflowEvent) -> Option<WorkflowState> {
        TRANSITIONS
            .iter()
            .find(|(f, e, _)| *f == from && *e == event)
            .map(|(_, _, to)| *to)
    }

    /// Events allowed from `from`.
    #[must_use]
    pub fn available_events(from: WorkflowState) -> Vec<WorkflowEvent> {
        TRANSITIONS
            .iter()
            .filter(|(f, _, _)| *f == from)
            .map(|(_, e, _)| *e)
            .collect()
    }

    /// Who may fire `event`.
    #[must_use]
    pub fn permission(event: WorkflowEvent) -> Permission {
        match event {
            WorkflowEvent::Submit | WorkflowEvent::Resubmit => Permission::Owner,
            WorkflowEvent::BeginReview
            | WorkflowEvent::RequestCorrection
            | WorkflowEvent::Reject => Permission::Role(Role::Reviewer),
            WorkflowEvent::Approve | WorkflowEvent::Settle => Permission::Role(Role::Authorizer),
            WorkflowEvent::Reopen => Permission::Role(Role::Administrator),
        }
    }

    /// Checks a command against the table and its guard.
    ///
    /// Checks run in order: table, permission, event guard. The first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the `GuardViolation` describing the refusal.
    pub fn check(
        settlement: &Settlement,
        actor: &Actor,
        command: &WorkflowCommand,
    ) -> Result<WorkflowState, GuardViolation> {
        let event = command.event();
        let to = Self::next_state(settlement.state, event).ok_or(
            GuardViolation::InvalidTransition {
                from: settlement.state,
                event,
            },
        )?;

        Self::check_permission(settlement, actor, event)?;

        match command {
            WorkflowCommand::Submit => {
                if settlement.invoices.is_empty() {
                    return Err(GuardViolation::NoInvoices);
                }
                require_complete(settlement)?;
            }
            WorkflowCommand::RequestCorrection { comment, fields } => {
                require_comment(comment)?;
                if fields.is_empty() {
                    return Err(GuardViolation::NoCorrectionFields);
                }
            }
            WorkflowCommand::Approve { .. } => require_complete(settlement)?,
            WorkflowCommand::Reject { comment } => require_comment(comment)?,
            WorkflowCommand::Resubmit { .. } => {
                let corrected = settlement.open_correction.as_ref().is_some_and(|request| {
                    settlement
                        .pending_changes
                        .iter()
                        .any(|change| request.allows(change.field))
                });
                if !corrected {
                    return Err(GuardViolation::NoCorrectionChanges);
                }
                require_complete(settlement)?;
            }
            WorkflowCommand::Settle { confirmation } => {
                if confirmation.reference.trim().is_empty() {
                    return Err(GuardViolation::MissingDisbursementReference);
                }
            }
            WorkflowCommand::BeginReview | WorkflowCommand::Reopen { .. } => {}
        }

        Ok(to)
    }

    /// Checks that the actor may change `field` of the settlement's invoices or payments.
    ///
    /// Only the owner may edit, and only in `Draft` or, in
    /// `CorrectionRequested`, the fields the reviewer opened.
    ///
    /// # Errors
    ///
    /// Returns `NotOwner`, `SettlementFrozen` or `FieldNotUnderCorrection`.
    pub fn check_mutation(
        settlement: &Settlement,
        actor: &Actor,
        field: CorrectableField,
    ) -> Result<(), GuardViolation> {
        if !settlement.is_owned_by(actor.user_id) {
            return Err(GuardViolation::NotOwner);
        }
        match settlement.state {
            WorkflowState::Draft => Ok(()),
            WorkflowState::CorrectionRequested => {
                if settlement
                    .open_correction
                    .as_ref()
                    .is_some_and(|request| request.allows(field))
                {
                    Ok(())
                } else {
                    Err(GuardViolation::FieldNotUnderCorrection { field })
                }
            }
            state => Err(GuardViolation::SettlementFrozen { state }),
        }
    }

    /// Checks only who may fire `event`, ignoring the transition table.
    pub(crate) fn check_permission(
        settlement: &Settlement,
        actor: &Actor,
        event: WorkflowEvent,
    ) -> Result<(), GuardViolation> {
        match Self::permission(event) {
            Permission::Owner if settlement.is_owned_by(actor.user_id) => Ok(()),
            Permission::Owner => Err(GuardViolation::NotOwner),
            Permission::Role(required) if actor.has_role(required) => Ok(()),
            Permission::Role(required) => Err(GuardViolation::InsufficientRole {
                required,
                actual: actor.role,
            }),
        }
    }
}

fn require_complete(settlement: &Settlement) -> Result<(), GuardViolation> {
    match settlement.snapshot().funding_state {
        FundingState::Complete => Ok(()),
        state => Err(GuardViolation::FundingNotComplete { state }),
    }
}

fn require_comment(comment: &str) -> Result<(), GuardViolation> {
    if comment.trim().is_empty() {
        Err(GuardViolation::CommentRequired)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::{NaiveDate, Utc};
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use liquida_shared::types::{BudgetId, Currency, InvoiceId, UserId};

    use crate::audit::FieldChange;
    use crate::invoice::Invoice;
    use crate::settlement::{CorrectionRequest, CreateSettlementInput};
    use crate::workflow::types::DisbursementConfirmation;

    fn settlement_with(owner: UserId, state: WorkflowState, invoiced: &[Decimal]) -> Settlement {
        let mut s = Settlement::new(
            owner,
            CreateSettlementInput {
                budget_id: BudgetId::new(),
                declared_total: dec!(500.00),
                description: None,
            },
            Currency::Gtq,
        );
        s.state = state;
        s.invoices = invoiced
            .iter()
            .map(|amount| Invoice {
                id: InvoiceId::new(),
                owner_id: owner,
                document_number: "FAC-1".to_string(),
                issue_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                authorization_number: "AUT-001".to_string(),
                issuer_name: "LIBRERIA PROGRESO".to_string(),
                total_amount: *amount,
                currency: Currency::Gtq,
            })
            .collect();
        s
    }

    fn correction(fields: &[CorrectableField]) -> CorrectionRequest {
        CorrectionRequest {
            fields: fields.iter().copied().collect(),
            comment: "fix it".to_string(),
            requested_by: UserId::new(),
            requested_at: Utc::now(),
        }
    }

    #[test]
    fn test_submit_complete_draft() {
        let owner = UserId::new();
        let s = settlement_with(owner, WorkflowState::Draft, &[dec!(500.00)]);
        let actor = Actor::new(owner, Role::Requester);

        assert_eq!(
            StateMachine::check(&s, &actor, &WorkflowCommand::Submit),
            Ok(WorkflowState::Submitted)
        );
    }

    #[rstest]
    #[case(&[], GuardViolation::NoInvoices)]
    #[case(&[dec!(499.99)], GuardViolation::FundingNotComplete { state: FundingState::Incomplete })]
    #[case(&[dec!(300), dec!(300)], GuardViolation::FundingNotComplete { state: FundingState::Exceeded })]
    fn test_submit_guards(#[case] invoiced: &[Decimal], #[case] expected: GuardViolation) {
        let owner = UserId::new();
        let s = settlement_with(owner, WorkflowState::Draft, invoiced);

        let result = StateMachine::check(&s, &Actor::new(owner, Role::Requester), &WorkflowCommand::Submit);

        assert_eq!(result, Err(expected));
    }

    #[test]
    fn test_submit_by_other_user_is_refused() {
        let s = settlement_with(UserId::new(), WorkflowState::Draft, &[dec!(500.00)]);
        let admin = Actor::new(UserId::new(), Role::Administrator);
        assert_eq!(
            StateMachine::check(&s, &admin, &WorkflowCommand::Submit),
            Err(GuardViolation::NotOwner)
        );
    }

    #[test]
    fn test_invalid_transition_reported_before_permission() {
        let s = settlement_with(UserId::new(), WorkflowState::Draft, &[dec!(500.00)]);
        let requester = Actor::new(UserId::new(), Role::Requester);

        assert_eq!(
            StateMachine::check(&s, &requester, &WorkflowCommand::Approve { comment: None }),
            Err(GuardViolation::InvalidTransition {
                from: WorkflowState::Draft,
                event: WorkflowEvent::Approve,
            })
        );
    }

    #[test]
    fn test_approve_requires_authorizer() {
        let s = settlement_with(UserId::new(), WorkflowState::UnderReview, &[dec!(500.00)]);
        let reviewer = Actor::new(UserId::new(), Role::Reviewer);
        let authorizer = Actor::new(UserId::new(), Role::Authorizer);
        let command = WorkflowCommand::Approve { comment: None };

        assert_eq!(
            StateMachine::check(&s, &reviewer, &command),
            Err(GuardViolation::InsufficientRole {
                required: Role::Authorizer,
                actual: Role::Reviewer,
            })
        );
        assert_eq!(
            StateMachine::check(&s, &authorizer, &command),
            Ok(WorkflowState::Approved)
        );
    }

    #[test]
    fn test_request_correction_guards() {
        let s = settlement_with(UserId::new(), WorkflowState::UnderReview, &[dec!(500.00)]);
        let reviewer = Actor::new(UserId::new(), Role::Reviewer);

        let blank = WorkflowCommand::RequestCorrection {
            comment: "  ".to_string(),
            fields: BTreeSet::from([CorrectableField::Invoices]),
        };
        assert_eq!(
            StateMachine::check(&s, &reviewer, &blank),
            Err(GuardViolation::CommentRequired)
        );

        let no_fields = WorkflowCommand::RequestCorrection {
            comment: "Missing receipt".to_string(),
            fields: BTreeSet::new(),
        };
        assert_eq!(
            StateMachine::check(&s, &reviewer, &no_fields),
            Err(GuardViolation::NoCorrectionFields)
        );
    }

    #[test]
    fn test_reject_requires_comment() {
        let s = settlement_with(UserId::new(), WorkflowState::UnderReview, &[dec!(500.00)]);
        let reviewer = Actor::new(UserId::new(), Role::Reviewer);
        assert_eq!(
            StateMachine::check(
                &s,
                &reviewer,
                &WorkflowCommand::Reject {
                    comment: String::new()
                }
            ),
            Err(GuardViolation::CommentRequired)
        );
    }

    #[test]
    fn test_resubmit_needs_change_to_requested_field() {
        let owner = UserId::new();
        let actor = Actor::new(owner, Role::Requester);
        let mut s = settlement_with(owner, WorkflowState::CorrectionRequested, &[dec!(500.00)]);
        s.open_correction = Some(correction(&[CorrectableField::InvoiceAmount]));
        let command = WorkflowCommand::Resubmit { comment: None };

        assert_eq!(
            StateMachine::check(&s, &actor, &command),
            Err(GuardViolation::NoCorrectionChanges)
        );

        s.pending_changes.push(FieldChange::new(
            CorrectableField::InvoiceAmount,
            "invoices[FAC-1].total_amount",
            Some("450.00".to_string()),
            Some("500.00".to_string()),
        ));
        assert_eq!(
            StateMachine::check(&s, &actor, &command),
            Ok(WorkflowState::Submitted)
        );
    }

    #[test]
    fn test_settle_requires_reference() {
        let s = settlement_with(UserId::new(), WorkflowState::Approved, &[dec!(500.00)]);
        let authorizer = Actor::new(UserId::new(), Role::Authorizer);
        let command = WorkflowCommand::Settle {
            confirmation: DisbursementConfirmation {
                reference: " ".to_string(),
                confirmed_at: Utc::now(),
            },
        };
        assert_eq!(
            StateMachine::check(&s, &authorizer, &command),
            Err(GuardViolation::MissingDisbursementReference)
        );
    }

    #[test]
    fn test_reopen_is_administrative() {
        let s = settlement_with(UserId::new(), WorkflowState::Rejected, &[dec!(500.00)]);
        let command = WorkflowCommand::Reopen { comment: None };

        assert!(StateMachine::check(&s, &Actor::new(UserId::new(), Role::Authorizer), &command).is_err());
        assert_eq!(
            StateMachine::check(&s, &Actor::new(UserId::new(), Role::Administrator), &command),
            Ok(WorkflowState::Draft)
        );
    }

    #[test]
    fn test_mutation_rules() {
        let owner = UserId::new();
        let actor = Actor::new(owner, Role::Requester);
        let mut s = settlement_with(owner, WorkflowState::Draft, &[]);

        assert!(StateMachine::check_mutation(&s, &actor, CorrectableField::Invoices).is_ok());
        assert_eq!(
            StateMachine::check_mutation(
                &s,
                &Actor::new(UserId::new(), Role::Administrator),
                CorrectableField::Invoices
            ),
            Err(GuardViolation::NotOwner)
        );

        s.state = WorkflowState::Submitted;
        assert_eq!(
            StateMachine::check_mutation(&s, &actor, CorrectableField::Invoices),
            Err(GuardViolation::SettlementFrozen {
                state: WorkflowState::Submitted
            })
        );

        s.state = WorkflowState::CorrectionRequested;
        s.open_correction = Some(correction(&[CorrectableField::Payments]));
        assert!(StateMachine::check_mutation(&s, &actor, CorrectableField::Payments).is_ok());
        assert_eq!(
            StateMachine::check_mutation(&s, &actor, CorrectableField::Invoices),
            Err(GuardViolation::FieldNotUnderCorrection {
                field: CorrectableField::Invoices
            })
        );
    }

    #[test]
    fn test_available_events() {
        assert_eq!(
            StateMachine::available_events(WorkflowState::UnderReview),
            vec![
                WorkflowEvent::RequestCorrection,
                WorkflowEvent::Approve,
                WorkflowEvent::Reject
            ]
        );
        assert!(StateMachine::available_events(WorkflowState::Settled).is_empty());
    }
}
