//! Revision trail queries and replay.

use std::borrow::Borrow;
use std::sync::Arc;

use tracing::error;

use liquida_shared::types::{SettlementId, UserId};

use super::error::AuditError;
use super::types::RevisionEntry;
use crate::settlement::SettlementStore;
use crate::workflow::types::WorkflowState;

/// Ordered history of one settlement.
///
/// A snapshot taken when [`AuditTrail::history`] was called; re-query for
/// fresh data.
#[derive(Debug)]
pub struct History {
    entries: std::vec::IntoIter<RevisionEntry>,
}

impl History {
    fn new(mut entries: Vec<RevisionEntry>) -> Self {
        sort_entries(&mut entries);
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for History {
    type Item = RevisionEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for History {}

/// Total order of a trail: by timestamp, ties broken by insertion sequence.
fn sort_entries(entries: &mut [RevisionEntry]) {
    entries.sort_by(|a, b| {
        a.recorded_at
            .cmp(&b.recorded_at)
            .then(a.sequence.cmp(&b.sequence))
    });
}

/// Append-only revision trail over a settlement store.
pub struct AuditTrail<S: SettlementStore> {
    store: Arc<S>,
}

impl<S: SettlementStore> AuditTrail<S> {
    /// Creates a trail over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Store` if the store is unavailable.
    pub async fn append(&self, entry: &RevisionEntry) -> Result<(), AuditError> {
        self.store.append_revision(entry).await.map_err(|e| {
            error!(
                settlement_id = %entry.settlement_id,
                sequence = entry.sequence,
                error = %e,
                "Failed to append revision"
            );
            AuditError::from(e)
        })
    }

    /// Ordered history of a settlement.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Store` if the store is unavailable.
    pub async fn history(&self, settlement_id: SettlementId) -> Result<History, AuditError> {
        Ok(History::new(self.store.revisions(settlement_id).await?))
    }

    /// Settlements owned by `user_id` that are waiting for corrections,
    /// oldest update first.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Store` if the store is unavailable.
    pub async fn corrections_pending_for(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SettlementId>, AuditError> {
        let mut pending: Vec<_> = self
            .store
            .find_by_owner(user_id)
            .await?
            .into_iter()
            .filter(|s| s.state == WorkflowState::CorrectionRequested)
            .collect();
        pending.sort_by_key(|s| (s.updated_at, s.id));
        Ok(pending.into_iter().map(|s| s.id).collect())
    }

    /// Entries recorded by one actor across all settlements.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Store` if the store is unavailable.
    pub async fn entries_by_actor(&self, actor: UserId) -> Result<Vec<RevisionEntry>, AuditError> {
        let mut entries = self.store.revisions_by_actor(actor).await?;
        sort_entries(&mut entries);
        Ok(entries)
    }
}

/// Folds a trail into the state it leads to, starting from `Draft`.
///
/// # Errors
///
/// Returns `AuditError::BrokenChain` if an entry does not start from the
/// state reached by the entries before it.
pub fn replay<I>(entries: I) -> Result<WorkflowState, AuditError>
where
    I: IntoIterator,
    I::Item: Borrow<RevisionEntry>,
{
    entries
        .into_iter()
        .try_fold(WorkflowState::Draft, |state, entry| {
            let entry: &RevisionEntry = entry.borrow();
            if entry.prior_state == state {
                Ok(entry.new_state)
            } else {
                Err(AuditError::BrokenChain {
                    sequence: entry.sequence,
                    expected: state,
                    found: entry.prior_state,
                })
            }
        })
}
