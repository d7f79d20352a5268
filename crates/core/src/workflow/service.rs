//! Settlement service: the caller-facing operations.
//!
//! Every mutating operation takes the caller's `expected_version`. The
//! service loads the settlement, checks the version and the guards, and
//! writes back with a compare-and-swap on the version. Transitions then
//! append one revision entry; if the append fails the settlement is restored.
//! Writes to one settlement are serialized per service instance, so the
//! rollback cannot be overtaken by another write through the same service.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, instrument, warn};

use liquida_shared::types::{
    Currency, InvoiceId, MAX_INTEGER_DIGITS, Money, PaymentId, RevisionId, SettlementId, UserId,
};
use liquida_shared::{AppError, SettlementConfig};

use crate::audit::{AuditTrail, FieldChange, History, RevisionEntry, replay};
use crate::budget::{BudgetSnapshot, ReconciliationService};
use crate::invoice::{
    AuthorizationCatalog, Invoice, InvoiceField, InvoiceInput, InvoicePatch, InvoiceValidator,
};
use crate::payment::{
    CapturedPayment, DepositSearch, PartnerDirectory, PaymentMethodTag, PaymentResolver,
    RawPaymentInput,
};
use crate::settlement::{
    CorrectionRequest, CreateSettlementInput, Settlement, SettlementStore, StoreError,
};
use crate::validation::ValidationReport;
use crate::workflow::error::WorkflowError;
use crate::workflow::machine::StateMachine;
use crate::workflow::types::{
    Actor, CorrectableField, DisbursementConfirmation, TransitionOutcome, WorkflowCommand,
};

/// Settlement reconciliation and workflow service.
pub struct SettlementService<S: SettlementStore, D: PartnerDirectory> {
    store: Arc<S>,
    trail: AuditTrail<S>,
    directory: Arc<D>,
    catalog: RwLock<Arc<AuthorizationCatalog>>,
    currency: Currency,
    min_partner_search_len: usize,
    write_locks: Mutex<HashMap<SettlementId, Arc<Mutex<()>>>>,
}

impl<S: SettlementStore, D: PartnerDirectory> SettlementService<S, D> {
    /// Creates the service from configuration.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Configuration` if the currency is unsupported
    /// or the authorization-code catalog is empty.
    pub fn new(
        config: &SettlementConfig,
        store: Arc<S>,
        directory: Arc<D>,
    ) -> Result<Self, WorkflowError> {
        let currency = config.currency().map_err(|e| {
            error!(error = %e, "Invalid settlement currency");
            configuration(e)
        })?;
        let catalog = AuthorizationCatalog::from_config(config).map_err(|e| {
            error!(error = %e, "Authorization code catalog missing");
            WorkflowError::from(e)
        })?;

        info!(
            currency = %currency,
            authorization_codes = catalog.len(),
            "Settlement service configured"
        );

        Ok(Self {
            trail: AuditTrail::new(Arc::clone(&store)),
            store,
            directory,
            catalog: RwLock::new(Arc::new(catalog)),
            currency,
            min_partner_search_len: config.min_partner_search_len,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Settlement currency.
    #[must_use]
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Replaces the authorization-code catalog.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Configuration` if `codes` is empty; the current
    /// catalog is kept.
    pub async fn replace_catalog<I, C>(&self, codes: I) -> Result<(), WorkflowError>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let catalog = AuthorizationCatalog::new(codes);
        if catalog.is_empty() {
            error!("Refusing to replace authorization catalog with an empty one");
            return Err(WorkflowError::Configuration(
                "authorization code catalog is not configured".to_string(),
            ));
        }
        info!(authorization_codes = catalog.len(), "Authorization catalog replaced");
        *self.catalog.write().await = Arc::new(catalog);
        Ok(())
    }

    /// Starts a deposit partner search bound to this service's directory.
    #[must_use]
    pub fn deposit_search(&self) -> DepositSearch<D> {
        DepositSearch::new(Arc::clone(&self.directory), self.min_partner_search_len)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Validates an invoice without attaching it.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Configuration` if the catalog is missing.
    pub async fn validate_invoice(
        &self,
        input: &InvoiceInput,
    ) -> Result<ValidationReport, WorkflowError> {
        let catalog = self.current_catalog().await;
        let validator = InvoiceValidator::new(&catalog, self.currency)?;
        Ok(validator.validate(input))
    }

    /// Loads a settlement.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::NotFound` if the settlement does not exist.
    pub async fn get_settlement(&self, id: SettlementId) -> Result<Settlement, WorkflowError> {
        Ok(self.store.load(id).await?)
    }

    /// Funding snapshot of a settlement.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::NotFound` if the settlement does not exist.
    pub async fn compute_budget_snapshot(
        &self,
        id: SettlementId,
    ) -> Result<BudgetSnapshot, WorkflowError> {
        Ok(self.store.load(id).await?.snapshot())
    }

    /// Ordered revision history of a settlement.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::NotFound` if the settlement does not exist.
    pub async fn get_history(&self, id: SettlementId) -> Result<History, WorkflowError> {
        self.store.load(id).await?;
        Ok(self.trail.history(id).await?)
    }

    /// Settlements of `user_id` waiting for corrections, oldest update first.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Persistence` if the store is unavailable.
    pub async fn get_pending_corrections(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SettlementId>, WorkflowError> {
        Ok(self.trail.corrections_pending_for(user_id).await?)
    }

    /// Revision entries recorded by one reviewer or owner.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Persistence` if the store is unavailable.
    pub async fn get_entries_by_actor(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RevisionEntry>, WorkflowError> {
        Ok(self.trail.entries_by_actor(user_id).await?)
    }

    // ========================================================================
    // Settlement, invoice and payment mutations
    // ========================================================================

    /// Creates a draft settlement owned by `actor`.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` if the declared total is not a
    /// positive amount with at most two decimals and twelve integer digits.
    #[instrument(skip(self, actor, input), fields(owner_id = %actor.user_id))]
    pub async fn create_settlement(
        &self,
        actor: &Actor,
        input: CreateSettlementInput,
    ) -> Result<Settlement, WorkflowError> {
        let declared = Money::new(input.declared_total, self.currency);
        if declared.is_zero() || declared.is_negative() {
            return Err(WorkflowError::invalid(
                "declared_total",
                "Declared total must be greater than zero",
            ));
        }
        if declared.exceeds_minor_units() {
            return Err(WorkflowError::invalid(
                "declared_total",
                format!(
                    "Declared total must have at most {} decimal places",
                    self.currency.minor_units()
                ),
            ));
        }
        if declared.exceeds_maximum() {
            return Err(WorkflowError::invalid(
                "declared_total",
                format!("Declared total must have at most {MAX_INTEGER_DIGITS} integer digits"),
            ));
        }

        let settlement = Settlement::new(actor.user_id, input, self.currency);
        self.store.insert(&settlement).await.map_err(|e| {
            error!(error = %e, "Failed to store settlement");
            WorkflowError::from(e)
        })?;

        info!(
            settlement_id = %settlement.id,
            declared_total = %declared,
            "Settlement created"
        );
        Ok(settlement)
    }

    /// Validates and attaches an invoice.
    ///
    /// # Errors
    ///
    /// * `Guard` if the settlement is frozen or the actor is not the owner.
    /// * `Validation` with every failing invoice rule, or if another invoice
    ///   already carries the same document number.
    /// * `Conflict` on a version mismatch.
    #[instrument(skip(self, actor, input), fields(actor = %actor.user_id))]
    pub async fn add_invoice(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        input: &InvoiceInput,
    ) -> Result<Settlement, WorkflowError> {
        let catalog = self.current_catalog().await;
        let validator = InvoiceValidator::new(&catalog, self.currency)?;

        self.mutate(
            id,
            actor,
            expected_version,
            &[CorrectableField::Invoices],
            |settlement| {
                let invoice = validator.normalize(InvoiceId::new(), settlement.owner_id, input)?;
                ensure_unique_document(&settlement.invoices, &invoice)?;
                let change = FieldChange::new(
                    CorrectableField::Invoices,
                    invoice_path(&invoice),
                    None,
                    Some(invoice.label()),
                );
                settlement.invoices.push(invoice);
                Ok(vec![change])
            },
        )
        .await
    }

    /// Detaches an invoice.
    ///
    /// # Errors
    ///
    /// * `Guard` if the settlement is frozen or the actor is not the owner.
    /// * `NotFound` if the invoice is not attached.
    /// * `Conflict` on a version mismatch.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn remove_invoice(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        invoice_id: InvoiceId,
    ) -> Result<Settlement, WorkflowError> {
        self.mutate(
            id,
            actor,
            expected_version,
            &[CorrectableField::Invoices],
            |settlement| {
                let index = settlement
                    .invoices
                    .iter()
                    .position(|i| i.id == invoice_id)
                    .ok_or_else(|| WorkflowError::not_found("Invoice", invoice_id))?;
                let invoice = settlement.invoices.remove(index);
                Ok(vec![FieldChange::new(
                    CorrectableField::Invoices,
                    invoice_path(&invoice),
                    Some(invoice.label()),
                    None,
                )])
            },
        )
        .await
    }

    /// Changes fields of an attached invoice.
    ///
    /// Every field the patch touches must be editable: any field in `Draft`,
    /// only the opened ones in `CorrectionRequested`. Values that normalize to
    /// what is already stored are not recorded as changes.
    ///
    /// # Errors
    ///
    /// * `Validation` if the patch is empty, the patched invoice is invalid,
    ///   or its document number collides with another attached invoice.
    /// * `Guard` if a touched field is not editable.
    /// * `NotFound` if the invoice is not attached.
    /// * `Conflict` on a version mismatch.
    #[instrument(skip(self, actor, patch), fields(actor = %actor.user_id))]
    pub async fn amend_invoice(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        invoice_id: InvoiceId,
        patch: &InvoicePatch,
    ) -> Result<Settlement, WorkflowError> {
        if patch.is_empty() {
            return Err(WorkflowError::invalid("invoice", "Nothing to change"));
        }
        let touched = touched_fields(patch);
        let catalog = self.current_catalog().await;
        let validator = InvoiceValidator::new(&catalog, self.currency)?;

        self.mutate(id, actor, expected_version, &touched, |settlement| {
            let index = settlement
                .invoices
                .iter()
                .position(|i| i.id == invoice_id)
                .ok_or_else(|| WorkflowError::not_found("Invoice", invoice_id))?;
            let current = &settlement.invoices[index];
            let amended =
                validator.normalize(current.id, current.owner_id, &current.patched_input(patch))?;
            ensure_unique_document(&settlement.invoices, &amended)?;
            let changes = invoice_diff(current, &amended);
            settlement.invoices[index] = amended;
            Ok(changes)
        })
        .await
    }

    /// Captures a deposit resolved through a [`DepositSearch`].
    ///
    /// # Errors
    ///
    /// * `Validation` if no partner account is selected, the amount is
    ///   invalid, or the payment would exceed the declared total.
    /// * `Guard` / `Conflict` as for every mutation.
    #[instrument(skip(self, actor, search, raw), fields(actor = %actor.user_id))]
    pub async fn capture_deposit_payment(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        search: &DepositSearch<D>,
        raw: &RawPaymentInput,
    ) -> Result<Settlement, WorkflowError> {
        let payload = search.confirmed().await?;
        let captured = PaymentResolver::capture_deposit(payload, raw);
        self.attach_payment(id, actor, expected_version, captured.map_err(Into::into))
            .await
    }

    /// Captures a check payment.
    ///
    /// # Errors
    ///
    /// * `Validation` with every failing field, or if the payment would
    ///   exceed the declared total.
    /// * `Guard` / `Conflict` as for every mutation.
    pub async fn capture_check_payment(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        raw: &RawPaymentInput,
    ) -> Result<Settlement, WorkflowError> {
        self.capture_tagged(id, actor, expected_version, PaymentMethodTag::Check, raw)
            .await
    }

    /// Captures a bank transfer payment.
    ///
    /// # Errors
    ///
    /// See [`SettlementService::capture_check_payment`].
    pub async fn capture_transfer_payment(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        raw: &RawPaymentInput,
    ) -> Result<Settlement, WorkflowError> {
        self.capture_tagged(id, actor, expected_version, PaymentMethodTag::Transfer, raw)
            .await
    }

    /// Captures a card payment.
    ///
    /// # Errors
    ///
    /// See [`SettlementService::capture_check_payment`].
    pub async fn capture_card_payment(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        raw: &RawPaymentInput,
    ) -> Result<Settlement, WorkflowError> {
        self.capture_tagged(id, actor, expected_version, PaymentMethodTag::Card, raw)
            .await
    }

    /// Captures a payment against a prior advance.
    ///
    /// # Errors
    ///
    /// See [`SettlementService::capture_check_payment`].
    pub async fn capture_advance_payment(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        raw: &RawPaymentInput,
    ) -> Result<Settlement, WorkflowError> {
        self.capture_tagged(id, actor, expected_version, PaymentMethodTag::Advance, raw)
            .await
    }

    /// Captures a payment for a method given by its textual tag.
    ///
    /// # Errors
    ///
    /// * `Configuration` if the tag is unknown.
    /// * Otherwise see [`SettlementService::capture_check_payment`].
    #[instrument(skip(self, actor, raw), fields(actor = %actor.user_id))]
    pub async fn capture_payment(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        tag: &str,
        raw: &RawPaymentInput,
    ) -> Result<Settlement, WorkflowError> {
        let captured = PaymentResolver::capture(tag, raw);
        self.attach_payment(id, actor, expected_version, captured.map_err(Into::into))
            .await
    }

    /// Removes a payment.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the payment is not attached.
    /// * `Guard` / `Conflict` as for every mutation.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn remove_payment(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        payment_id: PaymentId,
    ) -> Result<Settlement, WorkflowError> {
        self.mutate(
            id,
            actor,
            expected_version,
            &[CorrectableField::Payments],
            |settlement| {
                let index = settlement
                    .payments
                    .iter()
                    .position(|p| p.id == payment_id)
                    .ok_or_else(|| WorkflowError::not_found("Payment", payment_id))?;
                let payment = settlement.payments.remove(index);
                Ok(vec![FieldChange::new(
                    CorrectableField::Payments,
                    format!("payments[{}:{}]", payment.method.tag(), payment.method.reference()),
                    Some(payment.amount.to_string()),
                    None,
                )])
            },
        )
        .await
    }

    // ========================================================================
    // Workflow transitions
    // ========================================================================

    /// Draft → Submitted. Owner only; needs invoices and complete funding.
    ///
    /// # Errors
    ///
    /// `Guard`, `Conflict`, `NotFound` or `Persistence`.
    pub async fn submit(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.transition(id, actor, expected_version, WorkflowCommand::Submit)
            .await
    }

    /// Submitted → `UnderReview`. Reviewer or above.
    ///
    /// # Errors
    ///
    /// `Guard`, `Conflict`, `NotFound` or `Persistence`.
    pub async fn begin_review(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.transition(id, actor, expected_version, WorkflowCommand::BeginReview)
            .await
    }

    /// `UnderReview` → `CorrectionRequested`, opening `fields` for the owner.
    ///
    /// # Errors
    ///
    /// `Guard` (also for a blank comment or no fields), `Conflict`,
    /// `NotFound` or `Persistence`.
    pub async fn request_correction(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        comment: &str,
        fields: BTreeSet<CorrectableField>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let command = WorkflowCommand::RequestCorrection {
            comment: comment.to_string(),
            fields,
        };
        self.transition(id, actor, expected_version, command).await
    }

    /// `UnderReview` → Approved. Authorizer or above; funding must be complete.
    ///
    /// # Errors
    ///
    /// `Guard`, `Conflict`, `NotFound` or `Persistence`.
    pub async fn approve(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        comment: Option<&str>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let command = WorkflowCommand::Approve {
            comment: comment.map(str::to_string),
        };
        self.transition(id, actor, expected_version, command).await
    }

    /// `UnderReview` → Rejected. Reviewer or above; comment required.
    ///
    /// # Errors
    ///
    /// `Guard`, `Conflict`, `NotFound` or `Persistence`.
    pub async fn reject(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        comment: &str,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let command = WorkflowCommand::Reject {
            comment: comment.to_string(),
        };
        self.transition(id, actor, expected_version, command).await
    }

    /// `CorrectionRequested` → Submitted. Owner only; at least one opened
    /// field must have been changed.
    ///
    /// # Errors
    ///
    /// `Guard`, `Conflict`, `NotFound` or `Persistence`.
    pub async fn resubmit(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        comment: Option<&str>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let command = WorkflowCommand::Resubmit {
            comment: comment.map(str::to_string),
        };
        self.transition(id, actor, expected_version, command).await
    }

    /// Approved → Settled. Authorizer or above; needs a disbursement reference.
    ///
    /// # Errors
    ///
    /// `Guard`, `Conflict`, `NotFound` or `Persistence`.
    pub async fn settle(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        confirmation: DisbursementConfirmation,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.transition(
            id,
            actor,
            expected_version,
            WorkflowCommand::Settle { confirmation },
        )
        .await
    }

    /// Rejected → Draft. Administrator only.
    ///
    /// # Errors
    ///
    /// `Guard`, `Conflict`, `NotFound` or `Persistence`.
    pub async fn reopen(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        comment: Option<&str>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let command = WorkflowCommand::Reopen {
            comment: comment.map(str::to_string),
        };
        self.transition(id, actor, expected_version, command).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn current_catalog(&self) -> Arc<AuthorizationCatalog> {
        Arc::clone(&*self.catalog.read().await)
    }

    async fn capture_tagged(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        tag: PaymentMethodTag,
        raw: &RawPaymentInput,
    ) -> Result<Settlement, WorkflowError> {
        let captured = PaymentResolver::capture_tagged(tag, raw);
        self.attach_payment(id, actor, expected_version, captured.map_err(Into::into))
            .await
    }

    async fn attach_payment(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        captured: Result<CapturedPayment, WorkflowError>,
    ) -> Result<Settlement, WorkflowError> {
        self.mutate(
            id,
            actor,
            expected_version,
            &[CorrectableField::Payments],
            move |settlement| {
                let captured = captured?;
                let remaining =
                    ReconciliationService::remaining_to_pay(settlement.declared_total, &settlement.payments);
                if captured.amount > remaining {
                    return Err(WorkflowError::invalid(
                        "amount",
                        format!(
                            "Payment exceeds the remaining amount of {}",
                            Money::new(remaining, settlement.currency)
                        ),
                    ));
                }
                let payment = captured.into_payment(PaymentId::new(), settlement.owner_id);
                let change = FieldChange::new(
                    CorrectableField::Payments,
                    format!("payments[{}:{}]", payment.method.tag(), payment.method.reference()),
                    None,
                    Some(payment.amount.to_string()),
                );
                settlement.payments.push(payment);
                Ok(vec![change])
            },
        )
        .await
    }

    /// Waits for exclusive write access to one settlement.
    async fn lock_settlement(&self, id: SettlementId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.write_locks.lock().await;
            // Drop locks nobody holds or waits on.
            locks.retain(|key, lock| *key == id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// Loads, guards, applies `apply` to a copy, and saves with a version check.
    async fn mutate<F>(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        fields: &[CorrectableField],
        apply: F,
    ) -> Result<Settlement, WorkflowError>
    where
        F: FnOnce(&mut Settlement) -> Result<Vec<FieldChange>, WorkflowError>,
    {
        let _guard = self.lock_settlement(id).await;
        let current = self.store.load(id).await?;
        check_version(&current, expected_version)?;
        for field in fields {
            StateMachine::check_mutation(&current, actor, *field).map_err(|violation| {
                info!(
                    settlement_id = %id,
                    state = %current.state,
                    field = %field,
                    reason = %violation,
                    "Mutation refused"
                );
                violation
            })?;
        }

        let mut next = current.clone();
        let changes = apply(&mut next)?;
        if changes.is_empty() {
            debug!(settlement_id = %id, "Mutation changed nothing");
            return Ok(current);
        }
        next.touch(changes);

        self.store
            .save(&next, expected_version)
            .await
            .map_err(|e| log_save_failure(id, &e))?;

        debug!(
            settlement_id = %id,
            version = next.version,
            funding_state = %next.snapshot().funding_state,
            "Settlement updated"
        );
        Ok(next)
    }

    #[instrument(
        skip(self, actor, command),
        fields(actor = %actor.user_id, event = %command.event())
    )]
    async fn transition(
        &self,
        id: SettlementId,
        actor: &Actor,
        expected_version: u64,
        command: WorkflowCommand,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let event = command.event();
        let _guard = self.lock_settlement(id).await;
        // History first: saves precede appends, so the settlement read next
        // is never older than this history.
        let history: Vec<RevisionEntry> = self.trail.history(id).await?.collect();
        let current = self.store.load(id).await?;

        let duplicate = history.last().is_some_and(|last| {
            last.event == event
                && last.new_state == current.state
                && current.state == event.target()
                && (current.version == expected_version
                    || (last.actor == actor.user_id
                        && last.applied_to_version == expected_version))
        });
        if duplicate {
            StateMachine::check_permission(&current, actor, event).map_err(|violation| {
                info!(
                    settlement_id = %id,
                    state = %current.state,
                    reason = %violation,
                    "Repeated transition refused"
                );
                violation
            })?;
            debug!(settlement_id = %id, state = %current.state, "Transition already applied");
            return Ok(TransitionOutcome::NoChange {
                settlement: current,
            });
        }
        check_version(&current, expected_version)?;

        let replayed = replay(&history)?;
        if replayed != current.state {
            error!(
                settlement_id = %id,
                stored = %current.state,
                replayed = %replayed,
                "Stored state disagrees with revision trail"
            );
            return Err(WorkflowError::Persistence(format!(
                "stored state {} disagrees with revision trail state {replayed}",
                current.state
            )));
        }

        let to = StateMachine::check(&current, actor, &command).map_err(|violation| {
            info!(
                settlement_id = %id,
                from = %current.state,
                reason = %violation,
                "Transition refused"
            );
            violation
        })?;

        // Entries sort by recording time, so a clock stepping back must not
        // place this entry before the last one.
        let now = Utc::now();
        let now = history.last().map_or(now, |last| last.recorded_at.max(now));
        let mut next = current.clone();
        next.state = to;
        next.version += 1;
        next.updated_at = now;
        let changes = std::mem::take(&mut next.pending_changes);
        let correction_fields = match &command {
            WorkflowCommand::RequestCorrection { comment, fields } => {
                next.open_correction = Some(CorrectionRequest {
                    fields: fields.clone(),
                    comment: comment.trim().to_string(),
                    requested_by: actor.user_id,
                    requested_at: now,
                });
                fields.clone()
            }
            _ => {
                next.open_correction = None;
                BTreeSet::new()
            }
        };

        let entry = RevisionEntry {
            id: RevisionId::new(),
            settlement_id: id,
            sequence: history.iter().map(|e| e.sequence).max().unwrap_or(0) + 1,
            event,
            prior_state: current.state,
            new_state: to,
            actor: actor.user_id,
            recorded_at: now,
            comment: command.comment(),
            changes,
            correction_fields,
            applied_to_version: expected_version,
        };

        self.store
            .save(&next, expected_version)
            .await
            .map_err(|e| log_save_failure(id, &e))?;

        if let Err(e) = self.trail.append(&entry).await {
            if let Err(rollback) = self.store.save(&current, next.version).await {
                error!(
                    settlement_id = %id,
                    error = %rollback,
                    "Failed to roll back settlement after revision append failure"
                );
            } else {
                warn!(settlement_id = %id, "Transition rolled back");
            }
            return Err(WorkflowError::from(e));
        }

        info!(
            settlement_id = %id,
            from = %current.state,
            to = %to,
            version = next.version,
            "Settlement transitioned"
        );
        Ok(TransitionOutcome::Applied {
            settlement: next,
            revision: entry,
        })
    }
}

fn configuration(err: AppError) -> WorkflowError {
    match err {
        AppError::Configuration(message) => WorkflowError::Configuration(message),
        other => WorkflowError::Configuration(other.to_string()),
    }
}

fn check_version(settlement: &Settlement, expected_version: u64) -> Result<(), WorkflowError> {
    if settlement.version == expected_version {
        Ok(())
    } else {
        warn!(
            settlement_id = %settlement.id,
            expected = expected_version,
            actual = settlement.version,
            "Stale settlement version"
        );
        Err(WorkflowError::Conflict {
            expected: expected_version,
            actual: settlement.version,
        })
    }
}

fn log_save_failure(id: SettlementId, err: &StoreError) -> WorkflowError {
    match err {
        StoreError::Conflict { expected, actual } => {
            warn!(settlement_id = %id, expected, actual, "Lost optimistic save race");
        }
        other => error!(settlement_id = %id, error = %other, "Failed to save settlement"),
    }
    WorkflowError::from(err.clone())
}

fn ensure_unique_document(invoices: &[Invoice], candidate: &Invoice) -> Result<(), WorkflowError> {
    let taken = invoices
        .iter()
        .any(|i| i.id != candidate.id && i.document_number == candidate.document_number);
    if taken {
        return Err(WorkflowError::invalid(
            InvoiceField::DocumentNumber.as_str(),
            format!(
                "Document {} is already attached to this settlement",
                candidate.document_number
            ),
        ));
    }
    Ok(())
}

fn invoice_path(invoice: &Invoice) -> String {
    format!("invoices[{}]", invoice.document_number)
}

fn correctable(field: InvoiceField) -> Option<CorrectableField> {
    match field {
        InvoiceField::DocumentNumber => Some(CorrectableField::InvoiceDocumentNumber),
        InvoiceField::IssueDate => Some(CorrectableField::InvoiceIssueDate),
        InvoiceField::AuthorizationNumber => Some(CorrectableField::InvoiceAuthorization),
        InvoiceField::IssuerName => Some(CorrectableField::InvoiceIssuer),
        InvoiceField::TotalAmount => Some(CorrectableField::InvoiceAmount),
        InvoiceField::Currency => None,
    }
}

fn touched_fields(patch: &InvoicePatch) -> Vec<CorrectableField> {
    [
        (patch.document_number.is_some(), InvoiceField::DocumentNumber),
        (patch.issue_date.is_some(), InvoiceField::IssueDate),
        (patch.authorization_number.is_some(), InvoiceField::AuthorizationNumber),
        (patch.issuer_name.is_some(), InvoiceField::IssuerName),
        (patch.total_amount.is_some(), InvoiceField::TotalAmount),
    ]
    .into_iter()
    .filter(|(touched, _)| *touched)
    .filter_map(|(_, field)| correctable(field))
    .collect()
}

fn invoice_diff(before: &Invoice, after: &Invoice) -> Vec<FieldChange> {
    let prefix = invoice_path(before);
    let mut changes = Vec::new();
    let mut record = |field: InvoiceField, changed: bool, old: String, new: String| {
        if let Some(correctable) = correctable(field).filter(|_| changed) {
            changes.push(FieldChange::new(
                correctable,
                format!("{prefix}.{field}"),
                Some(old),
                Some(new),
            ));
        }
    };

    record(
        InvoiceField::DocumentNumber,
        before.document_number != after.document_number,
        before.document_number.clone(),
        after.document_number.clone(),
    );
    record(
        InvoiceField::IssueDate,
        before.issue_date != after.issue_date,
        before.issue_date.to_string(),
        after.issue_date.to_string(),
    );
    record(
        InvoiceField::AuthorizationNumber,
        before.authorization_number != after.authorization_number,
        before.authorization_number.clone(),
        after.authorization_number.clone(),
    );
    record(
        InvoiceField::IssuerName,
        before.issuer_name != after.issuer_name,
        before.issuer_name.clone(),
        after.issuer_name.clone(),
    );
    // Decimal equality ignores scale, so 500 and 500.00 are the same amount.
    record(
        InvoiceField::TotalAmount,
        before.total_amount != after.total_amount,
        before.total_amount.to_string(),
        after.total_amount.to_string(),
    );

    changes
}
