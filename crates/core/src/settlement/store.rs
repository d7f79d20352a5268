//! Settlement persistence boundary.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

use liquida_shared::types::{SettlementId, UserId};

use super::error::StoreError;
use super::types::Settlement;
use crate::audit::RevisionEntry;

/// Persistence of settlements and their revision trail.
///
/// `save` is a compare-and-swap on `version`: it only succeeds if the stored
/// settlement is still at `expected_version`.
pub trait SettlementStore: Send + Sync {
    /// Loads a settlement.
    fn load(&self, id: SettlementId)
    -> impl Future<Output = Result<Settlement, StoreError>> + Send;

    /// Stores a new settlement.
    fn insert(&self, settlement: &Settlement)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replaces a settlement if the stored version equals `expected_version`.
    fn save(
        &self,
        settlement: &Settlement,
        expected_version: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Appends a revision entry.
    fn append_revision(
        &self,
        entry: &RevisionEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Revision entries of one settlement, in insertion order.
    fn revisions(
        &self,
        id: SettlementId,
    ) -> impl Future<Output = Result<Vec<RevisionEntry>, StoreError>> + Send;

    /// Revision entries recorded by one actor, across settlements.
    fn revisions_by_actor(
        &self,
        actor: UserId,
    ) -> impl Future<Output = Result<Vec<RevisionEntry>, StoreError>> + Send;

    /// Settlements owned by a user.
    fn find_by_owner(
        &self,
        owner: UserId,
    ) -> impl Future<Output = Result<Vec<Settlement>, StoreError>> + Send;
}

/// In-memory store for development and tests.
///
/// Writes can be made to fail on demand to exercise rollback paths.
#[derive(Debug, Default)]
pub struct InMemorySettlementStore {
    settlements: RwLock<HashMap<SettlementId, Settlement>>,
    revisions: RwLock<Vec<RevisionEntry>>,
    fail_saves: AtomicBool,
    fail_appends: AtomicBool,
}

impl InMemorySettlementStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail with `Unavailable` while `fail` is set.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `append_revision` fail with `Unavailable` while `fail` is set.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Number of stored revision entries.
    pub async fn revision_count(&self) -> usize {
        self.revisions.read().await.len()
    }
}

impl SettlementStore for InMemorySettlementStore {
    async fn load(&self, id: SettlementId) -> Result<Settlement, StoreError> {
        self.settlements
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, settlement: &Settlement) -> Result<(), StoreError> {
        let mut settlements = self.settlements.write().await;
        if settlements.contains_key(&settlement.id) {
            return Err(StoreError::AlreadyExists(settlement.id));
        }
        settlements.insert(settlement.id, settlement.clone());
        Ok(())
    }

    async fn save(&self, settlement: &Settlement, expected_version: u64) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("save rejected".to_string()));
        }

        let mut settlements = self.settlements.write().await;
        let stored = settlements
            .get_mut(&settlement.id)
            .ok_or(StoreError::NotFound(settlement.id))?;
        if stored.version != expected_version {
            debug!(
                settlement_id = %settlement.id,
                expected = expected_version,
                actual = stored.version,
                "Rejecting stale save"
            );
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = settlement.clone();
        Ok(())
    }

    async fn append_revision(&self, entry: &RevisionEntry) -> Result<(), StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("append rejected".to_string()));
        }
        self.revisions.write().await.push(entry.clone());
        Ok(())
    }

    async fn revisions(&self, id: SettlementId) -> Result<Vec<RevisionEntry>, StoreError> {
        Ok(self
            .revisions
            .read()
            .await
            .iter()
            .filter(|e| e.settlement_id == id)
            .cloned()
            .collect())
    }

    async fn revisions_by_actor(&self, actor: UserId) -> Result<Vec<RevisionEntry>, StoreError> {
        Ok(self
            .revisions
            .read()
            .await
            .iter()
            .filter(|e| e.actor == actor)
            .cloned()
            .collect())
    }

    async fn find_by_owner(&self, owner: UserId) -> Result<Vec<Settlement>, StoreError> {
        Ok(self
            .settlements
            .read()
            .await
            .values()
            .filter(|s| s.owner_id == owner)
            .cloned()
            .collect())
    }
}
