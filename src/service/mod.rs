//! Business operations behind the HTTP handlers.
//!
//! Services validate requests, coordinate the stores, the object store and
//! the identity provider, and report failures as [`ServiceError`], which
//! renders into the JSON envelope.

mod attachments;
mod catalog;
mod users;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use course_core::{Envelope, ValidationError};
use tracing::error;

pub use attachments::{AttachmentLink, Upload};
pub use catalog::CatalogService;
pub use users::UserService;

use crate::{
    auth::{AuthError, ProviderError, password::PasswordError},
    storage::StorageError,
    store::StoreError,
};

/// Request-level failures outside authentication.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request body or parameters are invalid.
    #[error("{0}")]
    Validation(String),

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Persistence failed.
    #[error(transparent)]
    Store(StoreError),

    /// Object storage failed.
    #[error(transparent)]
    Storage(StorageError),

    /// The identity provider failed or refused an administrative call.
    #[error("identity provider error: {0}")]
    Identity(ProviderError),

    /// The identity provider refused the caller's credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// An unexpected local failure.
    #[error("{0}")]
    Internal(String),

    /// Authentication failed while serving the request.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ServiceError {
    /// HTTP status for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Store(StoreError::Conflict(_)) => StatusCode::BAD_REQUEST,
            Self::Storage(StorageError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Identity(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(e) => e.status(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what.to_string()),
            other => Self::Store(other),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<PasswordError> for ServiceError {
    fn from(e: PasswordError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.0)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let Self::Auth(e) = self {
            return e.into_response();
        }
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(Envelope::failure(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ServiceError::from(StoreError::NotFound("course not found")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::from(StoreError::Conflict("email already exists".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::from(StoreError::Backend("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::Identity(ProviderError::Transport("timeout".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientRole("admin".into())).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn not_found_message_is_the_entity() {
        let err = ServiceError::from(StoreError::NotFound("lesson not found"));
        assert_eq!(err.to_string(), "lesson not found");
    }

    #[tokio::test]
    async fn auth_errors_keep_their_challenge() {
        let response = ServiceError::from(AuthError::UserNotFound).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("WWW-Authenticate").is_some());
    }
}
