//! Core domain types for the hunt version store.
//! These are pure value types, no sqlx, no DB dependencies.

// Several enums intentionally use `from_str() -> Option<Self>` instead of
// `FromStr` because they return None for unknown values rather than an error.
#![allow(clippy::should_implement_trait)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HuntError;

/// Version numbers start at 1 and only ever grow.
pub type Version = i32;

// ── Identifiers ───────────────────────────────────────────────

/// Stable, externally visible numeric hunt identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HuntId(pub i64);

/// Globally unique step identifier, allocated from the `step_id` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub i64);

/// Numeric identifier of an uploaded asset (image, audio, video).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HuntId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Enums ─────────────────────────────────────────────────────

/// Who may play the live version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Unlisted => "unlisted",
            Self::Public => "public",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "unlisted" => Some(Self::Unlisted),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// Permission carried by a non-owner grant. Owner access is implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantPermission {
    View,
    Admin,
}

impl GrantPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Self::View),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// What a player must submit to complete a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Photo,
    Video,
    Audio,
    Text,
}

// ── Hunt root ─────────────────────────────────────────────────

/// One per hunt. Points at the current draft (`latest_version`) and the
/// published version served to players (`live_version`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntRoot {
    pub hunt_id: HuntId,
    pub creator_id: UserId,
    pub latest_version: Version,
    pub live_version: Option<Version>,
    pub is_deleted: bool,
    pub access_mode: AccessMode,
    pub play_slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HuntRoot {
    /// The draft is always the latest version.
    pub fn draft_version(&self) -> Version {
        self.latest_version
    }
}

// ── Version snapshots ─────────────────────────────────────────

/// Editable metadata carried by every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: Option<AssetId>,
}

/// Keyed by `(hunt_id, version)`. Exactly one per hunt has
/// `is_published = false`; once published it is never written again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub hunt_id: HuntId,
    pub version: Version,
    #[serde(flatten)]
    pub metadata: SnapshotMetadata,
    pub step_order: Vec<StepId>,
    pub is_published: bool,
    pub updated_at: DateTime<Utc>,
}

// ── Steps ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Challenge {
    Clue {
        text: String,
        #[serde(default)]
        image: Option<AssetId>,
    },
    Quiz {
        question: String,
        #[serde(default)]
        choices: Vec<String>,
        #[serde(default)]
        correct_choice: Option<u32>,
        #[serde(default)]
        accepted_answers: Vec<String>,
    },
    Mission {
        prompt: String,
        submission: SubmissionKind,
        #[serde(default)]
        reference_media: Option<AssetId>,
    },
    Task {
        instructions: String,
    },
}

impl Challenge {
    pub fn asset_refs(&self) -> Vec<AssetId> {
        match self {
            Self::Clue { image, .. } => image.iter().copied().collect(),
            Self::Mission {
                reference_media, ..
            } => reference_media.iter().copied().collect(),
            Self::Quiz { .. } | Self::Task { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    #[serde(default)]
    pub label: Option<String>,
}

/// The semantic payload of a step. Everything here takes part in change
/// detection; identity and bookkeeping fields live on [`Step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepContent {
    pub challenge: Challenge,
    #[serde(default)]
    pub required_location: Option<Location>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub time_limit_seconds: Option<u32>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl StepContent {
    pub fn asset_refs(&self) -> Vec<AssetId> {
        self.challenge.asset_refs()
    }
}

/// A persisted step, scoped to one `(hunt_id, version)` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: StepId,
    pub hunt_id: HuntId,
    pub version: Version,
    #[serde(flatten)]
    pub content: StepContent,
    pub updated_at: DateTime<Utc>,
}

// ── Save payload ──────────────────────────────────────────────

/// A step as submitted by the editor. No `step_id` means "create".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
    #[serde(default)]
    pub step_id: Option<StepId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub content: StepContent,
}

impl StepInput {
    pub fn new(content: StepContent) -> Self {
        Self {
            step_id: None,
            updated_at: None,
            content,
        }
    }

    pub fn existing(step_id: StepId, content: StepContent) -> Self {
        Self {
            step_id: Some(step_id),
            updated_at: None,
            content,
        }
    }
}

impl From<&Step> for StepInput {
    fn from(step: &Step) -> Self {
        Self {
            step_id: Some(step.step_id),
            updated_at: Some(step.updated_at),
            content: step.content.clone(),
        }
    }
}

/// The complete desired state of a draft. Always a full document: a step
/// missing from `steps` is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveHuntPayload {
    #[serde(flatten)]
    pub metadata: SnapshotMetadata,
    /// The version the editor loaded. Absent means the current draft.
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<StepInput>,
}

impl SaveHuntPayload {
    /// Every asset referenced anywhere in the payload, deduplicated, in
    /// first-seen order.
    pub fn asset_refs(&self) -> Vec<AssetId> {
        let mut refs = Vec::new();
        let all = self
            .metadata
            .cover_image
            .into_iter()
            .chain(self.steps.iter().flat_map(|s| s.content.asset_refs()));
        for asset in all {
            if !refs.contains(&asset) {
                refs.push(asset);
            }
        }
        refs
    }
}

impl From<&HuntView> for SaveHuntPayload {
    /// The payload that would reproduce `view` exactly, with every
    /// precondition populated.
    fn from(view: &HuntView) -> Self {
        Self {
            metadata: view.snapshot.metadata.clone(),
            version: Some(view.snapshot.version),
            updated_at: Some(view.snapshot.updated_at),
            steps: view.steps.iter().map(StepInput::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateHuntInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: Option<AssetId>,
    #[serde(default)]
    pub access_mode: Option<AccessMode>,
}

// ── Publish history and sharing ───────────────────────────────

/// Append-only record of one publish event, unique per `(hunt_id, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedRecord {
    pub hunt_id: HuntId,
    pub version: Version,
    /// Snapshot name at publish time, for history display.
    pub name: String,
    pub step_count: i32,
    pub published_at: DateTime<Utc>,
    pub published_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub hunt_id: HuntId,
    pub owner_id: UserId,
    pub shared_with_id: UserId,
    pub permission: GrantPermission,
    pub shared_by: UserId,
    pub shared_at: DateTime<Utc>,
}

// ── Read models and results ───────────────────────────────────

/// One snapshot of a hunt with its steps in `step_order` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntView {
    pub root: HuntRoot,
    pub snapshot: VersionSnapshot,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    #[serde(flatten)]
    pub record: PublishedRecord,
    pub is_live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionHistory {
    pub hunt_id: HuntId,
    pub latest_version: Version,
    pub live_version: Option<Version>,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    pub hunt_id: HuntId,
    pub published_version: Version,
    pub draft_version: Version,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseResult {
    pub hunt_id: HuntId,
    pub live_version: Option<Version>,
    pub previous_live_version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneResult {
    pub hunt_id: HuntId,
    pub cloned_from_hunt_id: HuntId,
    pub cloned_from_version: Version,
    pub cloned_at: DateTime<Utc>,
}

/// Arrange `steps` by `order`. Any mismatch between the two sets means the
/// stored aggregate is corrupt, which is reported as an internal error.
pub fn order_steps(order: &[StepId], steps: Vec<Step>) -> Result<Vec<Step>, HuntError> {
    if order.len() != steps.len() {
        return Err(HuntError::Internal(anyhow::anyhow!(
            "step order lists {} ids but {} steps are stored",
            order.len(),
            steps.len()
        )));
    }
    let mut by_id: HashMap<StepId, Step> = steps.into_iter().map(|s| (s.step_id, s)).collect();
    order
        .iter()
        .map(|id| {
            by_id.remove(id).ok_or_else(|| {
                HuntError::Internal(anyhow::anyhow!(
                    "step order references step {id} which is not stored for this version"
                ))
            })
        })
        .collect()
}
