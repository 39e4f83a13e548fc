use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::store::StorageError, state::session::SessionError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed while completing a mutation.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Missing or unverifiable credential on a protected action.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    /// Action not permitted for this caller or in this phase.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Action conflicts with already-recorded state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Internal state does not allow the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A precondition for the operation does not hold.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidTransition(invalid) => {
                ServiceError::Forbidden(invalid.to_string())
            }
            SessionError::SubmissionsClosed => ServiceError::Forbidden(err.to_string()),
            SessionError::NotNarrator | SessionError::NarratorCannotSubmit => {
                ServiceError::Forbidden(err.to_string())
            }
            SessionError::DuplicateSubmission(_) => ServiceError::Conflict(err.to_string()),
            SessionError::NoPlayers => ServiceError::PreconditionFailed(err.to_string()),
            SessionError::UnknownPlayer(_) => ServiceError::NotFound(err.to_string()),
            SessionError::NoActiveRound => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Action not permitted.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A precondition for the request does not hold.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::InvalidCredential(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::PreconditionFailed(message) => AppError::PreconditionFailed(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
