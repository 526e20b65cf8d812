// Request identity
//
// Resolves the owner id of the caller and hands it to handlers explicitly.
// JWT mode: `Authorization: Bearer <token>`, HS256, owner id = `sub`.
// None mode: the `x-user-id` header is trusted as is.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AuthConfig, AuthMode};
use crate::models::AppState;
use crate::types::{AppError, OwnerId};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// The caller's owner id, if any. Missing credentials are not an error here;
/// handlers decide whether they need an identity.
#[derive(Debug, Clone)]
pub struct Identity(pub Option<OwnerId>);

impl Identity {
    pub fn owner(&self) -> Option<&OwnerId> {
        self.0.as_ref()
    }

    pub fn require(self) -> Result<OwnerId, AppError> {
        self.0
            .ok_or_else(|| AppError::Auth("missing credentials".to_string()))
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_identity(&parts.headers, &state.config.auth).map(Identity)
    }
}

pub fn resolve_identity(headers: &HeaderMap, auth: &AuthConfig) -> Result<Option<OwnerId>, AppError> {
    match auth.mode {
        AuthMode::None => Ok(headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(OwnerId::new)),
        AuthMode::Jwt => {
            let Some(value) = headers.get(AUTHORIZATION) else {
                return Ok(None);
            };
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| AppError::Auth("malformed authorization header".to_string()))?;
            let claims = verify_jwt(token, &auth.secret)?;
            OwnerId::new(claims.sub)
                .map(Some)
                .ok_or_else(|| AppError::Auth("token subject is not a valid owner id".to_string()))
        }
    }
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Hosted auth tokens carry an audience we do not pin.
    validation.validate_aud = false;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            AppError::Auth(format!("invalid token: {}", e))
        })
}

#[cfg(test)]
pub(crate) fn sign_token(sub: &str, secret: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: sub.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("token encodes")
}
