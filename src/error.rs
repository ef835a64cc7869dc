use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::accounts::repo::StoreError;

/// Failures surfaced by the account directory, one per response status.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Login attempted for an email with no account.
    #[error("User not found")]
    UnknownEmail,

    /// Acting user id has no account.
    #[error("User not found.")]
    UserNotFound(i64),

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("Your account is blocked.")]
    Blocked,

    #[error("Email already registered")]
    Conflict,

    #[error("Internal server error")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownEmail | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::UserNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Blocked => StatusCode::FORBIDDEN,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => ApiError::Conflict,
            StoreError::Backend(e) => ApiError::Store(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(e) = &self {
            error!(error = ?e, "request failed in store");
        }
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
