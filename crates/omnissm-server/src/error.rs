//! API error mapping.
//!
//! Every non-200 response carries the same body shape:
//! `{"error": "<kind>", "message": "<human>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use omnissm_identity::IdentityError;
use omnissm_manager::ManagerError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("invalid signature: {0}")]
    InvalidSignature(&'static str),

    #[error("unauthorized account")]
    UnauthorizedAccount,

    #[error("entry not found")]
    NotFound,

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::InvalidSignature(_)
            | ApiError::UnauthorizedAccount => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid-request",
            ApiError::InvalidSignature(_) => "invalid-signature",
            ApiError::UnauthorizedAccount => "unauthorized-account",
            ApiError::NotFound => "entry-not-found",
            ApiError::Internal(_) => "internal-error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::InvalidRequest(message) | ApiError::InvalidSignature(message) => {
                (*message).to_string()
            }
            ApiError::UnauthorizedAccount => "unauthorized account".to_string(),
            ApiError::NotFound => "entry not found".to_string(),
            ApiError::Internal(_) => "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            tracing::error!("internal error: {err:?}");
        }
        let body = Json(ErrorBody {
            error: self.kind().to_string(),
            message: self.message(),
        });
        (self.status(), body).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MalformedJson(_) => ApiError::InvalidRequest("malformed json"),
            IdentityError::UnknownProvider(_) => ApiError::InvalidRequest("unknown provider"),
            IdentityError::MalformedRsaSignature(_) => {
                ApiError::InvalidRequest("malformed rsa signature")
            }
            IdentityError::InvalidIdentity => ApiError::InvalidSignature("invalid identity"),
        }
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        ApiError::Internal(err.into())
    }
}
