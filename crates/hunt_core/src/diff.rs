//! Step diff engine.
//! Reconciles a full-document step list against the persisted steps of one
//! snapshot and infers the minimal set of writes.
//!
//! | Incoming step            | Persisted?  | Projection | Outcome     |
//! |--------------------------|-------------|------------|-------------|
//! | no `step_id`             | -           | -          | create      |
//! | `step_id`                | yes         | differs    | update      |
//! | `step_id`                | yes         | equal      | unchanged   |
//! | (absent from the list)   | yes         | -          | delete      |
//! | `step_id`                | no          | -          | rejected    |

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::canonical::projection_hash;
use crate::error::HuntError;
use crate::types::{Step, StepContent, StepId, StepInput};

/// One rewrite of an existing step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepUpdate {
    pub step_id: StepId,
    pub content: StepContent,
    /// Optimistic precondition supplied by the editor, if any.
    pub expected_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepDiff {
    /// New steps, in their relative payload order.
    pub to_create: Vec<StepContent>,
    /// Changed steps, in payload order.
    pub to_update: Vec<StepUpdate>,
    /// Persisted steps omitted from the payload, in persisted order.
    pub to_delete: Vec<StepId>,
    /// Persisted steps submitted with an identical projection.
    pub unchanged: Vec<StepId>,
}

impl StepDiff {
    /// No step writes are needed.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Reject payloads the diff cannot interpret: a `step_id` listed twice, or a
/// `step_id` that does not belong to the snapshot being edited.
pub fn validate_incoming(incoming: &[StepInput], existing: &[Step]) -> Result<(), HuntError> {
    let known: HashSet<StepId> = existing.iter().map(|s| s.step_id).collect();
    let mut seen = HashSet::new();
    for id in incoming.iter().filter_map(|s| s.step_id) {
        if !seen.insert(id) {
            return Err(HuntError::Validation(format!(
                "step {id} appears more than once in the payload"
            )));
        }
        if !known.contains(&id) {
            return Err(HuntError::Validation(format!(
                "step {id} does not belong to this hunt version"
            )));
        }
    }
    Ok(())
}

/// Compute create/update/delete sets for `incoming` against `existing`.
pub fn diff_steps(incoming: &[StepInput], existing: &[Step]) -> Result<StepDiff, HuntError> {
    validate_incoming(incoming, existing)?;

    let index: HashMap<StepId, &Step> = existing.iter().map(|s| (s.step_id, s)).collect();
    let mut diff = StepDiff::default();
    let mut submitted = HashSet::new();

    for input in incoming {
        let Some(step_id) = input.step_id else {
            diff.to_create.push(input.content.clone());
            continue;
        };
        submitted.insert(step_id);
        // Presence guaranteed by validate_incoming.
        let Some(current) = index.get(&step_id) else {
            continue;
        };
        if projection_hash(&input.content)? == projection_hash(&current.content)? {
            diff.unchanged.push(step_id);
        } else {
            diff.to_update.push(StepUpdate {
                step_id,
                content: input.content.clone(),
                expected_updated_at: input.updated_at,
            });
        }
    }

    diff.to_delete = existing
        .iter()
        .map(|s| s.step_id)
        .filter(|id| !submitted.contains(id))
        .collect();

    Ok(diff)
}

/// Map the payload order onto final identifiers: steps that came with an id
/// keep it, new steps take the freshly allocated ids in creation order.
pub fn resolve_step_order(
    incoming: &[StepInput],
    created_ids: &[StepId],
) -> Result<Vec<StepId>, HuntError> {
    let mut fresh = created_ids.iter();
    let order = incoming
        .iter()
        .map(|input| match input.step_id {
            Some(id) => Some(id),
            None => fresh.next().copied(),
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            HuntError::Internal(anyhow::anyhow!(
                "fewer ids were allocated ({}) than new steps submitted",
                created_ids.len()
            ))
        })?;
    if fresh.next().is_some() {
        return Err(HuntError::Internal(anyhow::anyhow!(
            "more ids were allocated ({}) than new steps submitted",
            created_ids.len()
        )));
    }
    Ok(order)
}

// ── Tests ─────────────────────────────────────────────────────────
