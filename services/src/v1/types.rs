//! Shared types for V1 API endpoints.

use serde::{Deserialize, Serialize};

/// Generic error response for V1 API.
#[derive(Debug, Serialize)]
pub struct V1ErrorResponse {
    pub error: String,
    pub message: String,
}

impl V1ErrorResponse {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: "not_found".to_owned(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: "bad_request".to_owned(),
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            error: "internal_error".to_owned(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            error: "forbidden".to_owned(),
            message: message.into(),
        }
    }
}

/// Query of `GET /v1/pins/search`.
#[derive(Debug, Deserialize)]
pub struct V1SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Body of comment create and update requests.
#[derive(Debug, Deserialize)]
pub struct V1CommentRequest {
    pub text: String,
}

/// Body of `GET /v1/users/{id}/pins/count`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct V1PinsCountResponse {
    pub pins_count: i32,
}
