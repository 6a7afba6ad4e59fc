//! Storage and collaborator port traits.
//! Implemented by hunt_postgres (and by `crate::memory` for tests). Core
//! logic depends only on these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::HuntError;
use crate::types::*;

pub type Result<T> = std::result::Result<T, HuntError>;

// ── Version store ─────────────────────────────────────────────

/// Entry point to the persisted hunt aggregate.
///
/// Reads used by the permission gate run outside any transaction; every
/// mutation goes through a [`HuntTx`] obtained from [`HuntStore::begin`].
#[async_trait]
pub trait HuntStore: Send + Sync {
    /// Open a transaction. Dropping the returned handle without calling
    /// [`HuntTx::commit`] rolls every write back.
    async fn begin(&self) -> Result<Box<dyn HuntTx>>;

    /// Load a hunt root, deleted or not.
    async fn load_root(&self, hunt_id: HuntId) -> Result<Option<HuntRoot>>;

    /// Find a non-deleted hunt by its play slug.
    async fn find_root_by_slug(&self, play_slug: &str) -> Result<Option<HuntRoot>>;

    /// Load the grant for `(hunt_id, user_id)`.
    async fn load_grant(&self, hunt_id: HuntId, user_id: &UserId) -> Result<Option<AccessGrant>>;
}

/// One ACID transaction over the hunt aggregate.
///
/// Conditional writes return `false` when their precondition matched zero
/// rows; interpreting that outcome is the caller's job.
#[async_trait]
pub trait HuntTx: Send {
    // ── Roots ──────────────────────────────────────────────────

    async fn load_root(&mut self, hunt_id: HuntId) -> Result<Option<HuntRoot>>;

    async fn insert_root(&mut self, root: &HuntRoot) -> Result<()>;

    /// Advance `latest_version` from `expected` to `latest`.
    async fn advance_latest_version(
        &mut self,
        hunt_id: HuntId,
        expected: Version,
        latest: Version,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Set `live_version` only if it currently equals `expected` (NULL-safe).
    async fn compare_and_set_live(
        &mut self,
        hunt_id: HuntId,
        expected: Option<Version>,
        live: Option<Version>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Soft delete: flag the root and clear its live pointer.
    async fn mark_deleted(&mut self, hunt_id: HuntId, now: DateTime<Utc>) -> Result<bool>;

    // ── Snapshots ──────────────────────────────────────────────

    async fn load_snapshot(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<VersionSnapshot>>;

    /// Load a snapshot and hold its row lock until the transaction ends.
    /// Reads of the version's steps made after this see every committed edit.
    async fn lock_draft(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<VersionSnapshot>>;

    async fn insert_snapshot(&mut self, snapshot: &VersionSnapshot) -> Result<()>;

    /// Write metadata onto the draft under the precondition
    /// `is_published = false [AND updated_at = expected_updated_at]`.
    async fn update_draft_metadata(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        metadata: &SnapshotMetadata,
        expected_updated_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Replace the draft's step order. Requires `is_published = false`.
    async fn set_step_order(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        step_order: &[StepId],
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Flip `is_published` false → true.
    async fn mark_published(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    // ── Steps ──────────────────────────────────────────────────

    async fn load_steps(&mut self, hunt_id: HuntId, version: Version) -> Result<Vec<Step>>;

    /// Delete steps; returns the number removed.
    async fn delete_steps(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        step_ids: &[StepId],
    ) -> Result<u64>;

    /// Rewrite one step's content under `step_id matches [AND updated_at = expected]`.
    async fn update_step(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        step_id: StepId,
        content: &StepContent,
        expected_updated_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn insert_steps(&mut self, steps: &[Step]) -> Result<()>;

    // ── Publish history ────────────────────────────────────────

    async fn insert_published_record(&mut self, record: &PublishedRecord) -> Result<()>;

    async fn load_published_record(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<PublishedRecord>>;

    /// All publish records of a hunt, ascending by version.
    async fn list_published_records(&mut self, hunt_id: HuntId) -> Result<Vec<PublishedRecord>>;

    // ── Grants ─────────────────────────────────────────────────

    /// Insert or replace the grant for `(hunt_id, shared_with_id)`.
    async fn upsert_grant(&mut self, grant: &AccessGrant) -> Result<()>;

    async fn delete_grant(&mut self, hunt_id: HuntId, shared_with_id: &UserId) -> Result<bool>;

    /// Grants of a hunt, ordered by `shared_at`.
    async fn list_grants(&mut self, hunt_id: HuntId) -> Result<Vec<AccessGrant>>;

    // ── Asset usage index ──────────────────────────────────────

    /// Replace the set of assets recorded as used by `hunt_id`.
    async fn replace_asset_usage(&mut self, hunt_id: HuntId, assets: &[AssetId]) -> Result<()>;

    /// Make every write visible atomically.
    async fn commit(self: Box<Self>) -> Result<()>;
}

// ── Collaborators ─────────────────────────────────────────────

/// Named monotonic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    HuntId,
    StepId,
    AssetId,
}

impl Counter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HuntId => "hunt_id",
            Self::StepId => "step_id",
            Self::AssetId => "asset_id",
        }
    }
}

/// Atomic, durable, never-reusing id source.
///
/// Values are consumed even if the transaction that asked for them rolls
/// back; ids are never derived from counting existing rows.
#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    async fn next(&self, counter: Counter) -> Result<i64>;

    /// Allocate `n` consecutive-or-not values in allocation order.
    async fn next_n(&self, counter: Counter, n: usize) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            ids.push(self.next(counter).await?);
        }
        Ok(ids)
    }
}

/// Checks that every referenced asset exists and belongs to the caller.
#[async_trait]
pub trait AssetValidator: Send + Sync {
    /// Fails with `NotFound` for a missing asset and `Forbidden` for one
    /// owned by someone else.
    async fn validate_or_throw(&self, assets: &[AssetId], user_id: &UserId) -> Result<()>;
}

/// Recomputes which assets a hunt's current draft references.
#[async_trait]
pub trait AssetUsageTracker: Send + Sync {
    /// Must run inside the caller's transaction so the index commits (or
    /// rolls back) together with the edit that changed it.
    async fn rebuild_hunt_asset_usage(&self, hunt_id: HuntId, tx: &mut dyn HuntTx) -> Result<()>;
}
