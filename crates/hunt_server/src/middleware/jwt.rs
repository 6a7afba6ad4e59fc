//! Bearer-token authentication.
//!
//! Verifies an HS256 JWT from the `Authorization` header and inserts the
//! resulting [`Principal`] as a request extension.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use hunt_core::principal::{JwtClaims, Principal};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

#[derive(Clone)]
pub struct JwtConfig {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Identity providers in dev mint tokens without `exp`.
        validation.required_spec_claims.clear();
        Self {
            key: Arc::new(DecodingKey::from_secret(secret)),
            validation: Arc::new(validation),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, String> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| format!("invalid token: {e}"))?;
        Principal::from_jwt_claims(&data.claims).map_err(|e| e.user_message())
    }
}

fn unauthorized(message: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "unauthorized", "message": message })),
    )
        .into_response()
}

pub async fn jwt_auth(
    Extension(config): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return unauthorized("missing bearer token".into());
    };
    match config.verify(token) {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(message) => {
            tracing::debug!(%message, "rejected bearer token");
            unauthorized(message)
        }
    }
}
