use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::ApiError};

/// Header the web client sends the session token in.
pub const TOKEN_HEADER: &str = "x-auth-token";

/// Claims
///
/// Payload of every session token issued by this service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id this token speaks for.
    pub sub: Uuid,
    /// Expiration Time (exp): seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat): seconds since the epoch.
    pub iat: usize,
}

/// issue_token
///
/// Signs a token for `user_id` with the configured secret and lifetime.
///
/// # Errors
/// `ApiError::Internal` when the expiry does not fit the clock (a lifetime no loaded
/// config allows) or when signing fails.
pub fn issue_token(user_id: Uuid, config: &AppConfig) -> Result<String, ApiError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let exp = usize::try_from(config.jwt_expiry_secs)
        .ok()
        .and_then(|lifetime| now.checked_add(lifetime))
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "token lifetime of {}s overflows the expiry timestamp",
                config.jwt_expiry_secs
            ))
        })?;

    let claims = Claims {
        sub: user_id,
        iat: now,
        exp,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

/// verify_token
///
/// Checks signature and expiry and returns the decoded claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
}

/// Pulls the raw token from `x-auth-token`, falling back to `Authorization: Bearer`.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|value| value.to_str().ok()) {
        return Some(token.trim()).filter(|token| !token.is_empty());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// AuthUser
///
/// The verified identity of the caller. Handlers take it as an argument; if the token
/// is missing or fails verification the request is rejected before the handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let token = token_from_headers(&parts.headers)
            .ok_or(ApiError::Unauthenticated("No token, authorization denied"))?;

        let claims = verify_token(token, &config.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            ApiError::Unauthenticated("Token is not valid")
        })?;

        Ok(AuthUser { id: claims.sub })
    }
}
