use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::database::SqlStorageError;
use crate::users::UserStorageError;
use crate::v1::types::V1ErrorResponse;

/// Failure of a pins operation.
#[derive(Debug, thiserror::Error)]
pub enum PinsError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] SqlStorageError),

    #[error("User storage error: {0}")]
    UserStorage(#[from] UserStorageError),
}

impl PinsError {
    pub fn not_found(message: impl Into<String>) -> Self {
        PinsError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        PinsError::Forbidden(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        PinsError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PinsError::NotFound(_) => StatusCode::NOT_FOUND,
            PinsError::Forbidden(_) => StatusCode::FORBIDDEN,
            PinsError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PinsError::Storage(_) | PinsError::UserStorage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PinsError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            PinsError::NotFound(message) => V1ErrorResponse::not_found(message),
            PinsError::Forbidden(message) => V1ErrorResponse::forbidden(message),
            PinsError::BadRequest(message) => V1ErrorResponse::bad_request(message),
            err @ (PinsError::Storage(_) | PinsError::UserStorage(_)) => {
                tracing::error!("Pins operation failed: {}", err);
                V1ErrorResponse::internal_error("Internal server error")
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            PinsError::not_found("Pin not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(PinsError::forbidden("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            PinsError::bad_request("This post is already saved.").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PinsError::from(SqlStorageError::Db("boom".to_owned())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn message_is_the_display_text() {
        assert_eq!(
            PinsError::not_found("Comment not found.").to_string(),
            "Comment not found."
        );
    }
}
