use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{models::MessageResponse, repository::RepositoryError};

/// FieldError
///
/// One entry of the `errors` array returned for rejected request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FieldError {
    pub msg: String,
    pub param: String,
    pub location: String,
}

/// ValidationErrorResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ValidationErrorResponse {
    pub errors: Vec<FieldError>,
}

/// ApiError
///
/// Every failure a handler or extractor can report. Client-facing variants carry the
/// message that ends up in the `msg` body; `Internal` carries a diagnostic that is logged
/// and never sent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body failed validation")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    /// A redundant like or unlike.
    #[error("{0}")]
    Conflict(&'static str),
    /// Missing, malformed, tampered or expired token.
    #[error("{0}")]
    Unauthenticated(&'static str),
    /// Authenticated, but not the owner of the resource.
    #[error("User not authorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated(_) | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => {
                (status, Json(ValidationErrorResponse { errors })).into_response()
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (status, "Server Error").into_response()
            }
            other => (status, Json(MessageResponse::new(other.to_string()))).into_response(),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| FieldError {
                    msg: failure
                        .message
                        .as_ref()
                        .map(|msg| msg.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {field}")),
                    param: field.to_string(),
                    location: "body".to_string(),
                })
            })
            .collect();
        // field_errors() is a HashMap; keep the response deterministic.
        fields.sort_by(|a, b| a.param.cmp(&b.param));
        ApiError::Validation(fields)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateEmail => ApiError::BadRequest("User already exists".into()),
            RepositoryError::PostMissing(_) => ApiError::NotFound("Post not found"),
            RepositoryError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ApiError::Internal(format!("token signing failed: {err}"))
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(err: argon2::password_hash::Error) -> Self {
        ApiError::Internal(format!("password hashing failed: {err}"))
    }
}
