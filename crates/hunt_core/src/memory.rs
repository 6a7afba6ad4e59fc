//! In-memory port implementations for tests and local development.
//!
//! Transactions are serialized: [`InMemoryHuntStore::begin`] takes the store
//! lock for the lifetime of the transaction and works on a private copy of
//! the state, which `commit` swaps in. Dropping the transaction discards the
//! copy. Store-level reads take the same lock, so a task must not call them
//! while it holds an open transaction.
//!
//! Unique keys mirror the Postgres schema, including at most one unpublished
//! snapshot per hunt.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::HuntError;
use crate::ports::{AssetValidator, Counter, HuntStore, HuntTx, Result, SequenceAllocator};
use crate::types::*;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    roots: BTreeMap<HuntId, HuntRoot>,
    snapshots: BTreeMap<(HuntId, Version), VersionSnapshot>,
    steps: BTreeMap<StepId, Step>,
    published: BTreeMap<(HuntId, Version), PublishedRecord>,
    grants: BTreeMap<(HuntId, UserId), AccessGrant>,
    asset_usage: BTreeMap<HuntId, Vec<AssetId>>,
}

// ── Version store ─────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InMemoryHuntStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryHuntStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with roots and grants (no snapshots).
    pub fn seeded(roots: Vec<HuntRoot>, grants: Vec<AccessGrant>) -> Self {
        let state = MemoryState {
            roots: roots.into_iter().map(|r| (r.hunt_id, r)).collect(),
            grants: grants
                .into_iter()
                .map(|g| ((g.hunt_id, g.shared_with_id.clone()), g))
                .collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Every snapshot of a hunt, ascending by version.
    pub async fn snapshots(&self, hunt_id: HuntId) -> Vec<VersionSnapshot> {
        let state = self.state.lock().await;
        state
            .snapshots
            .range((hunt_id, Version::MIN)..=(hunt_id, Version::MAX))
            .map(|(_, s)| s.clone())
            .collect()
    }

    /// The asset-usage index entry for a hunt.
    pub async fn asset_usage(&self, hunt_id: HuntId) -> Vec<AssetId> {
        let state = self.state.lock().await;
        state.asset_usage.get(&hunt_id).cloned().unwrap_or_default()
    }

    /// Total stored steps across every hunt and version.
    pub async fn step_count(&self) -> usize {
        self.state.lock().await.steps.len()
    }
}

#[async_trait]
impl HuntStore for InMemoryHuntStore {
    async fn begin(&self) -> Result<Box<dyn HuntTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryHuntTx { guard, working }))
    }

    async fn load_root(&self, hunt_id: HuntId) -> Result<Option<HuntRoot>> {
        Ok(self.state.lock().await.roots.get(&hunt_id).cloned())
    }

    async fn find_root_by_slug(&self, play_slug: &str) -> Result<Option<HuntRoot>> {
        let state = self.state.lock().await;
        Ok(state
            .roots
            .values()
            .find(|r| !r.is_deleted && r.play_slug == play_slug)
            .cloned())
    }

    async fn load_grant(&self, hunt_id: HuntId, user_id: &UserId) -> Result<Option<AccessGrant>> {
        let state = self.state.lock().await;
        Ok(state.grants.get(&(hunt_id, user_id.clone())).cloned())
    }
}

pub struct InMemoryHuntTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn duplicate(what: String) -> HuntError {
    HuntError::Conflict(format!("duplicate key: {what}"))
}

#[async_trait]
impl HuntTx for InMemoryHuntTx {
    async fn load_root(&mut self, hunt_id: HuntId) -> Result<Option<HuntRoot>> {
        Ok(self.working.roots.get(&hunt_id).cloned())
    }

    async fn insert_root(&mut self, root: &HuntRoot) -> Result<()> {
        if self.working.roots.contains_key(&root.hunt_id) {
            return Err(duplicate(format!("hunt {}", root.hunt_id)));
        }
        if self
            .working
            .roots
            .values()
            .any(|r| r.play_slug == root.play_slug)
        {
            return Err(duplicate(format!("play slug {}", root.play_slug)));
        }
        self.working.roots.insert(root.hunt_id, root.clone());
        Ok(())
    }

    async fn advance_latest_version(
        &mut self,
        hunt_id: HuntId,
        expected: Version,
        latest: Version,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        match self.working.roots.get_mut(&hunt_id) {
            Some(root) if !root.is_deleted && root.latest_version == expected => {
                root.latest_version = latest;
                root.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_set_live(
        &mut self,
        hunt_id: HuntId,
        expected: Option<Version>,
        live: Option<Version>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        match self.working.roots.get_mut(&hunt_id) {
            Some(root) if !root.is_deleted && root.live_version == expected => {
                root.live_version = live;
                root.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_deleted(&mut self, hunt_id: HuntId, now: DateTime<Utc>) -> Result<bool> {
        match self.working.roots.get_mut(&hunt_id) {
            Some(root) if !root.is_deleted => {
                root.is_deleted = true;
                root.live_version = None;
                root.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn load_snapshot(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<VersionSnapshot>> {
        Ok(self.working.snapshots.get(&(hunt_id, version)).cloned())
    }

    async fn lock_draft(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<VersionSnapshot>> {
        // The transaction already holds the store lock.
        self.load_snapshot(hunt_id, version).await
    }

    async fn insert_snapshot(&mut self, snapshot: &VersionSnapshot) -> Result<()> {
        let key = (snapshot.hunt_id, snapshot.version);
        if self.working.snapshots.contains_key(&key) {
            return Err(duplicate(format!(
                "snapshot v{} of hunt {}",
                snapshot.version, snapshot.hunt_id
            )));
        }
        if !snapshot.is_published
            && self
                .working
                .snapshots
                .values()
                .any(|s| s.hunt_id == snapshot.hunt_id && !s.is_published)
        {
            return Err(duplicate(format!(
                "second unpublished snapshot for hunt {}",
                snapshot.hunt_id
            )));
        }
        self.working.snapshots.insert(key, snapshot.clone());
        Ok(())
    }

    async fn update_draft_metadata(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        metadata: &SnapshotMetadata,
        expected_updated_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        match self.working.snapshots.get_mut(&(hunt_id, version)) {
            Some(s)
                if !s.is_published
                    && expected_updated_at.map_or(true, |t| t == s.updated_at) =>
            {
                s.metadata = metadata.clone();
                s.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_step_order(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        step_order: &[StepId],
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        match self.working.snapshots.get_mut(&(hunt_id, version)) {
            Some(s) if !s.is_published => {
                s.step_order = step_order.to_vec();
                s.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_published(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        match self.working.snapshots.get_mut(&(hunt_id, version)) {
            Some(s) if !s.is_published => {
                s.is_published = true;
                s.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn load_steps(&mut self, hunt_id: HuntId, version: Version) -> Result<Vec<Step>> {
        Ok(self
            .working
            .steps
            .values()
            .filter(|s| s.hunt_id == hunt_id && s.version == version)
            .cloned()
            .collect())
    }

    async fn delete_steps(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        step_ids: &[StepId],
    ) -> Result<u64> {
        let mut removed = 0;
        for id in step_ids {
            let matches = self
                .working
                .steps
                .get(id)
                .is_some_and(|s| s.hunt_id == hunt_id && s.version == version);
            if matches {
                self.working.steps.remove(id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn update_step(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        step_id: StepId,
        content: &StepContent,
        expected_updated_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        match self.working.steps.get_mut(&step_id) {
            Some(s)
                if s.hunt_id == hunt_id
                    && s.version == version
                    && expected_updated_at.map_or(true, |t| t == s.updated_at) =>
            {
                s.content = content.clone();
                s.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_steps(&mut self, steps: &[Step]) -> Result<()> {
        for step in steps {
            if self.working.steps.contains_key(&step.step_id) {
                return Err(duplicate(format!("step {}", step.step_id)));
            }
            self.working.steps.insert(step.step_id, step.clone());
        }
        Ok(())
    }

    async fn insert_published_record(&mut self, record: &PublishedRecord) -> Result<()> {
        let key = (record.hunt_id, record.version);
        if self.working.published.contains_key(&key) {
            return Err(duplicate(format!(
                "published record v{} of hunt {}",
                record.version, record.hunt_id
            )));
        }
        self.working.published.insert(key, record.clone());
        Ok(())
    }

    async fn load_published_record(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<PublishedRecord>> {
        Ok(self.working.published.get(&(hunt_id, version)).cloned())
    }

    async fn list_published_records(&mut self, hunt_id: HuntId) -> Result<Vec<PublishedRecord>> {
        Ok(self
            .working
            .published
            .range((hunt_id, Version::MIN)..=(hunt_id, Version::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn upsert_grant(&mut self, grant: &AccessGrant) -> Result<()> {
        self.working
            .grants
            .insert((grant.hunt_id, grant.shared_with_id.clone()), grant.clone());
        Ok(())
    }

    async fn delete_grant(&mut self, hunt_id: HuntId, shared_with_id: &UserId) -> Result<bool> {
        Ok(self
            .working
            .grants
            .remove(&(hunt_id, shared_with_id.clone()))
            .is_some())
    }

    async fn list_grants(&mut self, hunt_id: HuntId) -> Result<Vec<AccessGrant>> {
        let mut grants: Vec<AccessGrant> = self
            .working
            .grants
            .values()
            .filter(|g| g.hunt_id == hunt_id)
            .cloned()
            .collect();
        grants.sort_by(|a, b| a.shared_at.cmp(&b.shared_at));
        Ok(grants)
    }

    async fn replace_asset_usage(&mut self, hunt_id: HuntId, assets: &[AssetId]) -> Result<()> {
        self.working.asset_usage.insert(hunt_id, assets.to_vec());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

// ── Collaborators ─────────────────────────────────────────────

fn poisoned<T>(_: PoisonError<T>) -> HuntError {
    HuntError::Internal(anyhow::anyhow!("in-memory lock poisoned"))
}

/// Counters starting at 1 unless told otherwise.
#[derive(Debug, Default)]
pub struct InMemorySequences {
    next: std::sync::Mutex<HashMap<Counter, i64>>,
}

impl InMemorySequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `counter` hand out `first` next.
    pub fn starting_at(mut self, counter: Counter, first: i64) -> Self {
        if let Ok(next) = self.next.get_mut() {
            next.insert(counter, first);
        }
        self
    }
}

#[async_trait]
impl SequenceAllocator for InMemorySequences {
    async fn next(&self, counter: Counter) -> Result<i64> {
        let mut next = self.next.lock().map_err(poisoned)?;
        let slot = next.entry(counter).or_insert(1);
        let value = *slot;
        *slot += 1;
        Ok(value)
    }
}

/// Asset registry keyed by id, recording each asset's owner.
#[derive(Debug, Default)]
pub struct InMemoryAssets {
    owners: std::sync::Mutex<HashMap<AssetId, UserId>>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, asset: AssetId, owner: &UserId) -> Result<()> {
        self.owners
            .lock()
            .map_err(poisoned)?
            .insert(asset, owner.clone());
        Ok(())
    }
}

#[async_trait]
impl AssetValidator for InMemoryAssets {
    async fn validate_or_throw(&self, assets: &[AssetId], user_id: &UserId) -> Result<()> {
        let owners = self.owners.lock().map_err(poisoned)?;
        for asset in assets {
            match owners.get(asset) {
                None => return Err(HuntError::NotFound(format!("asset {asset} not found"))),
                Some(owner) if owner != user_id => {
                    return Err(HuntError::Forbidden(format!(
                        "asset {asset} belongs to another user"
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(hunt: i64, version: Version, published: bool) -> VersionSnapshot {
        VersionSnapshot {
            hunt_id: HuntId(hunt),
            version,
            metadata: SnapshotMetadata {
                name: "h".into(),
                ..Default::default()
            },
            step_order: vec![],
            is_published: published,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryHuntStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_snapshot(&snapshot(1, 1, false)).await.unwrap();
        }
        assert!(store.snapshots(HuntId(1)).await.is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert_snapshot(&snapshot(1, 1, false)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.snapshots(HuntId(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn second_unpublished_snapshot_is_rejected() {
        let store = InMemoryHuntStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_snapshot(&snapshot(1, 1, false)).await.unwrap();
        let err = tx
            .insert_snapshot(&snapshot(1, 2, false))
            .await
            .unwrap_err();
        assert!(matches!(err, HuntError::Conflict(_)));
    }

    #[tokio::test]
    async fn lock_draft_reads_within_the_transaction() {
        let store = InMemoryHuntStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_snapshot(&snapshot(1, 1, false)).await.unwrap();
        let locked = tx.lock_draft(HuntId(1), 1).await.unwrap().unwrap();
        assert!(!locked.is_published);
        assert!(tx.lock_draft(HuntId(1), 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sequences_never_repeat() {
        let seq = InMemorySequences::new().starting_at(Counter::StepId, 101);
        assert_eq!(seq.next(Counter::StepId).await.unwrap(), 101);
        assert_eq!(seq.next_n(Counter::StepId, 2).await.unwrap(), vec![102, 103]);
        assert_eq!(seq.next(Counter::HuntId).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn asset_validation_distinguishes_missing_and_foreign() {
        let assets = InMemoryAssets::new();
        let alice = UserId::new("alice");
        assets.register(AssetId(1), &alice).unwrap();
        assets.register(AssetId(2), &UserId::new("bob")).unwrap();

        assert!(assets.validate_or_throw(&[AssetId(1)], &alice).await.is_ok());
        assert!(matches!(
            assets.validate_or_throw(&[AssetId(2)], &alice).await,
            Err(HuntError::Forbidden(_))
        ));
        assert!(matches!(
            assets.validate_or_throw(&[AssetId(3)], &alice).await,
            Err(HuntError::NotFound(_))
        ));
    }
}
