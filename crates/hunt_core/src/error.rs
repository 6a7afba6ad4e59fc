use thiserror::Error;

/// Message shown when an optimistic-concurrency precondition on the draft fails.
pub const MSG_DRAFT_CONFLICT: &str =
    "this was modified by someone else, please refresh and try again";

/// Message shown when a save targets a version that has already been published.
pub const MSG_EDIT_PUBLISHED: &str =
    "cannot edit a published version; create a new version or unpublish first";

/// Message shown when the live pointer moved between read and release.
pub const MSG_LIVE_CONFLICT: &str = "the live version changed, please refresh the version panel";

/// Deliberately conflates "does not exist" with "no grant" so callers
/// without access cannot probe for hunt ids.
pub const MSG_HUNT_NOT_FOUND: &str = "hunt not found or access denied";

#[derive(Debug, Error)]
pub enum HuntError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HuntError {
    pub fn hunt_not_found() -> Self {
        Self::NotFound(MSG_HUNT_NOT_FOUND.into())
    }

    pub fn draft_conflict() -> Self {
        Self::Conflict(MSG_DRAFT_CONFLICT.into())
    }

    pub fn live_conflict() -> Self {
        Self::Conflict(MSG_LIVE_CONFLICT.into())
    }

    pub fn edit_published() -> Self {
        Self::Validation(MSG_EDIT_PUBLISHED.into())
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::Validation(_) => 422,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable kind, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }

    /// Text safe to show an end user. Internal details never leave the process.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Forbidden(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Internal(_) => "an unexpected error occurred".into(),
        }
    }

    /// Retrying the same request after a refetch can succeed only for conflicts.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
