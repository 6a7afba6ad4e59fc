//! Structural validation of editor input. Pure, no storage.
//!
//! Runs before any transaction opens. All problems in a payload are
//! collected and reported together as one `Validation` error.

use crate::error::HuntError;
use crate::types::{Challenge, SaveHuntPayload, SnapshotMetadata, StepContent};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_STEPS: usize = 500;

/// A single problem, addressed by a dotted path into the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

pub fn validate_metadata(metadata: &SnapshotMetadata, issues: &mut Vec<ValidationIssue>) {
    let name = metadata.name.trim();
    if name.is_empty() {
        issues.push(issue("name", "must not be empty"));
    } else if name.chars().count() > MAX_NAME_LEN {
        issues.push(issue(
            "name",
            &format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
}

pub fn validate_step_content(
    content: &StepContent,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    match &content.challenge {
        Challenge::Clue { text, .. } if text.trim().is_empty() => {
            issues.push(issue(&format!("{path}.challenge.text"), "must not be empty"));
        }
        Challenge::Quiz {
            question,
            choices,
            correct_choice,
            accepted_answers,
        } => {
            if question.trim().is_empty() {
                issues.push(issue(
                    &format!("{path}.challenge.question"),
                    "must not be empty",
                ));
            }
            match correct_choice {
                Some(idx) if (*idx as usize) >= choices.len() => issues.push(issue(
                    &format!("{path}.challenge.correct_choice"),
                    &format!("index {idx} is out of range for {} choices", choices.len()),
                )),
                None if accepted_answers.is_empty() => issues.push(issue(
                    &format!("{path}.challenge"),
                    "a quiz needs a correct choice or at least one accepted answer",
                )),
                _ => {}
            }
        }
        Challenge::Mission { prompt, .. } if prompt.trim().is_empty() => {
            issues.push(issue(&format!("{path}.challenge.prompt"), "must not be empty"));
        }
        Challenge::Task { instructions } if instructions.trim().is_empty() => {
            issues.push(issue(
                &format!("{path}.challenge.instructions"),
                "must not be empty",
            ));
        }
        _ => {}
    }

    if content.time_limit_seconds == Some(0) {
        issues.push(issue(
            &format!("{path}.time_limit_seconds"),
            "must be positive when set",
        ));
    }
    if content.max_attempts == Some(0) {
        issues.push(issue(
            &format!("{path}.max_attempts"),
            "must be positive when set",
        ));
    }

    if let Some(loc) = &content.required_location {
        if !(-90.0..=90.0).contains(&loc.latitude) {
            issues.push(issue(
                &format!("{path}.required_location.latitude"),
                "must be within [-90, 90]",
            ));
        }
        if !(-180.0..=180.0).contains(&loc.longitude) {
            issues.push(issue(
                &format!("{path}.required_location.longitude"),
                "must be within [-180, 180]",
            ));
        }
        if !(loc.radius_meters > 0.0) {
            issues.push(issue(
                &format!("{path}.required_location.radius_meters"),
                "must be positive",
            ));
        }
    }
}

/// Validate a full save payload.
pub fn validate_payload(payload: &SaveHuntPayload) -> Result<(), HuntError> {
    let mut issues = Vec::new();
    validate_metadata(&payload.metadata, &mut issues);
    if payload.steps.len() > MAX_STEPS {
        issues.push(issue(
            "steps",
            &format!("a hunt may have at most {MAX_STEPS} steps"),
        ));
    }
    for (i, step) in payload.steps.iter().enumerate() {
        validate_step_content(&step.content, &format!("steps[{i}]"), &mut issues);
    }
    into_result(issues)
}

/// Turn collected issues into a single `Validation` error.
pub fn into_result(issues: Vec<ValidationIssue>) -> Result<(), HuntError> {
    if issues.is_empty() {
        return Ok(());
    }
    let joined = issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(HuntError::Validation(joined))
}

fn issue(path: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        message: message.to_string(),
    }
}
