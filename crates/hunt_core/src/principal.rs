use std::collections::HashMap;

use crate::error::HuntError;
use crate::types::UserId;

/// The authenticated caller. Passed explicitly to every service operation.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: UserId,
    pub claims: HashMap<String, String>,
}

impl Principal {
    /// Construct from validated JWT claims at the server boundary.
    /// The server middleware calls this; core logic never reads raw tokens.
    pub fn from_jwt_claims(claims: &JwtClaims) -> Result<Self, HuntError> {
        let sub = claims
            .sub
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| HuntError::Forbidden("missing sub claim".into()))?;
        Ok(Self {
            user_id: UserId(sub),
            claims: claims
                .extra
                .iter()
                .flatten()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
        })
    }

    /// Construct explicitly for in-process callers and tests.
    /// There is no implicit or thread-local identity anywhere in the codebase.
    pub fn in_process(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            claims: HashMap::new(),
        }
    }
}

/// JWT claims shape expected from the identity provider.
#[derive(Debug, serde::Deserialize)]
pub struct JwtClaims {
    pub sub: Option<String>,
    /// Remaining claims (`exp`, `iat`, custom). Only string-valued ones are
    /// carried onto the principal.
    #[serde(flatten)]
    pub extra: Option<HashMap<String, serde_json::Value>>,
}
