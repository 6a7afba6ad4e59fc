//! Canonical comparable projection of step content.
//!
//! Algorithm:
//!   1. Serialize the semantic fields of a step (`StepContent`) to a JSON value
//!   2. Re-serialize the value compactly; object keys come out sorted
//!   3. Hash: SHA-256 of ("v1:" + canonical JSON)
//!
//! Identity and bookkeeping fields (`step_id`, `version`, `updated_at`,
//! position in the step order) are not part of `StepContent`, so two steps
//! that differ only in those compare equal.

use sha2::{Digest, Sha256};

use crate::error::HuntError;
use crate::types::StepContent;

/// Current projection version prefix.
pub const PROJECTION_VERSION: &str = "v1";

/// Canonical JSON text of a step's semantic fields.
pub fn canonical_json(content: &StepContent) -> Result<String, HuntError> {
    // Going through `Value` sorts object keys (serde_json's default map is a
    // BTreeMap), independent of struct field order.
    let value = serde_json::to_value(content)
        .map_err(|e| HuntError::Internal(anyhow::anyhow!("step projection failed: {e}")))?;
    serde_json::to_string(&value)
        .map_err(|e| HuntError::Internal(anyhow::anyhow!("step projection failed: {e}")))
}

/// Hex-encoded SHA-256 of the canonical projection.
pub fn projection_hash(content: &StepContent) -> Result<String, HuntError> {
    let canonical = canonical_json(content)?;
    let mut hasher = Sha256::new();
    hasher.update(PROJECTION_VERSION.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Challenge, Location};

    fn clue(text: &str) -> StepContent {
        StepContent {
            challenge: Challenge::Clue {
                text: text.into(),
                image: None,
            },
            required_location: None,
            hint: None,
            time_limit_seconds: None,
            max_attempts: None,
        }
    }

    #[test]
    fn test_projection_hash_deterministic() {
        let h1 = projection_hash(&clue("under the oak")).unwrap();
        let h2 = projection_hash(&clue("under the oak")).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_projection_hash_sees_nested_changes() {
        let mut a = clue("x");
        a.required_location = Some(Location {
            latitude: 51.5,
            longitude: -0.12,
            radius_meters: 25.0,
            label: None,
        });
        let mut b = a.clone();
        if let Some(loc) = b.required_location.as_mut() {
            loc.radius_meters = 30.0;
        }
        assert_ne!(projection_hash(&a).unwrap(), projection_hash(&b).unwrap());
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let json = canonical_json(&clue("x")).unwrap();
        let challenge = json.find("\"challenge\"").unwrap();
        let hint = json.find("\"hint\"").unwrap();
        let time_limit = json.find("\"time_limit_seconds\"").unwrap();
        assert!(challenge < hint && hint < time_limit);
    }

    #[test]
    fn test_absent_and_explicit_none_project_identically() {
        let explicit: StepContent = serde_json::from_value(serde_json::json!({
            "challenge": { "type": "task", "instructions": "jump" },
            "hint": null,
            "max_attempts": null
        }))
        .unwrap();
        let omitted: StepContent = serde_json::from_value(serde_json::json!({
            "challenge": { "type": "task", "instructions": "jump" }
        }))
        .unwrap();
        assert_eq!(
            projection_hash(&explicit).unwrap(),
            projection_hash(&omitted).unwrap()
        );
    }
}
