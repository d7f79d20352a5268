//! Property-based tests for the settlement state machine.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;

use liquida_shared::types::{BudgetId, Currency, InvoiceId, RevisionId, SettlementId, UserId};

use crate::audit::{FieldChange, RevisionEntry, replay};
use crate::invoice::Invoice;
use crate::settlement::{CorrectionRequest, CreateSettlementInput, Settlement};
use crate::workflow::error::GuardViolation;
use crate::workflow::machine::{Permission, StateMachine, TRANSITIONS};
use crate::workflow::types::{
    Actor, CorrectableField, DisbursementConfirmation, Role, WorkflowCommand, WorkflowEvent,
    WorkflowState,
};

fn arb_state() -> impl Strategy<Value = WorkflowState> {
    prop::sample::select(WorkflowState::ALL.to_vec())
}

fn arb_event() -> impl Strategy<Value = WorkflowEvent> {
    prop::sample::select(vec![
        WorkflowEvent::Submit,
        WorkflowEvent::BeginReview,
        WorkflowEvent::RequestCorrection,
        WorkflowEvent::Approve,
        WorkflowEvent::Reject,
        WorkflowEvent::Resubmit,
        WorkflowEvent::Settle,
        WorkflowEvent::Reopen,
    ])
}

fn command_for(event: WorkflowEvent) -> WorkflowCommand {
    match event {
        WorkflowEvent::Submit => WorkflowCommand::Submit,
        WorkflowEvent::BeginReview => WorkflowCommand::BeginReview,
        WorkflowEvent::RequestCorrection => WorkflowCommand::RequestCorrection {
            comment: "Attach the missing receipt".to_string(),
            fields: BTreeSet::from([CorrectableField::Invoices]),
        },
        WorkflowEvent::Approve => WorkflowCommand::Approve { comment: None },
        WorkflowEvent::Reject => WorkflowCommand::Reject {
            comment: "Out of policy".to_string(),
        },
        WorkflowEvent::Resubmit => WorkflowCommand::Resubmit { comment: None },
        WorkflowEvent::Settle => WorkflowCommand::Settle {
            confirmation: DisbursementConfirmation {
                reference: "TRX-1".to_string(),
                confirmed_at: Utc::now(),
            },
        },
        WorkflowEvent::Reopen => WorkflowCommand::Reopen { comment: None },
    }
}

/// A fully funded settlement in `state` with every guard satisfiable.
fn funded(owner: UserId, state: WorkflowState) -> Settlement {
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
    s.invoices.push(Invoice {
        id: InvoiceId::new(),
        owner_id: owner,
        document_number: "FAC-1".to_string(),
        issue_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        authorization_number: "AUT-001".to_string(),
        issuer_name: "LIBRERIA PROGRESO".to_string(),
        total_amount: dec!(500.00),
        currency: Currency::Gtq,
    });
    s.open_correction = Some(CorrectionRequest {
        fields: BTreeSet::from([CorrectableField::Invoices]),
        comment: "fix".to_string(),
        requested_by: UserId::new(),
        requested_at: Utc::now(),
    });
    s.pending_changes.push(FieldChange::new(
        CorrectableField::Invoices,
        "invoices[FAC-1]",
        None,
        Some("FAC-1".to_string()),
    ));
    s
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// With every guard satisfied, a command succeeds exactly when the table has the edge.
    #[test]
    fn prop_check_matches_table(state in arb_state(), event in arb_event()) {
        let owner = UserId::new();
        let s = funded(owner, state);
        let actor = Actor::new(owner, Role::Administrator);

        let result = StateMachine::check(&s, &actor, &command_for(event));

        match StateMachine::next_state(state, event) {
            Some(to) => prop_assert_eq!(result, Ok(to)),
            None => prop_assert_eq!(
                result,
                Err(GuardViolation::InvalidTransition { from: state, event })
            ),
        }
    }

    /// Role-gated events are refused for every role below the requirement.
    #[test]
    fn prop_role_below_requirement_is_refused(index in 0usize..TRANSITIONS.len()) {
        let (from, event, _) = TRANSITIONS[index];
        let s = funded(UserId::new(), from);

        if let Permission::Role(required) = StateMachine::permission(event) {
            for role in [Role::Requester, Role::Reviewer, Role::Authorizer, Role::Administrator] {
                let actor = Actor::new(UserId::new(), role);
                let result = StateMachine::check(&s, &actor, &command_for(event));
                prop_assert_eq!(result.is_ok(), role >= required);
            }
        }
    }

    /// Replaying the entries of any walk through the table yields the walk's final state.
    #[test]
    fn prop_replay_of_walk_reaches_final_state(choices in prop::collection::vec(0usize..3, 0..20)) {
        let id = SettlementId::new();
        let mut state = WorkflowState::Draft;
        let mut entries = Vec::new();
        let mut sequence = 0u64;

        for choice in choices {
            let events = StateMachine::available_events(state);
            if events.is_empty() {
                break;
            }
            let event = events[choice % events.len()];
            let Some(next) = StateMachine::next_state(state, event) else {
                break;
            };
            sequence += 1;
            entries.push(RevisionEntry {
                id: RevisionId::new(),
                settlement_id: id,
                sequence,
                event,
                prior_state: state,
                new_state: next,
                actor: UserId::new(),
                recorded_at: Utc::now(),
                comment: None,
                changes: Vec::new(),
                correction_fields: BTreeSet::new(),
                applied_to_version: sequence - 1,
            });
            state = next;
        }

        prop_assert_eq!(replay(&entries).unwrap(), state);
    }
}
