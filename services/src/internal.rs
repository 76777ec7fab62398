//! Internal routes module.
//!
//! Operator-only endpoints for seeding users and categories. They are
//! guarded by a shared key sent in the `x-internal-key` header.
//!
//! # Security
//!
//! Outside Local and Test environments `INTERNAL_API_KEY` is required. If
//! it is somehow absent, every internal request is rejected with 401.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, post},
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::auth::generate_session_token;
use crate::config::Config;
use crate::database::SqlStorage;
use crate::pins::PinsError;
use crate::pins::models::UserProfile;
use crate::users::{AppState, NewUser, UserStorage, UserStorageError};

pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

/// Error response for internal endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<UserStorageError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: UserStorageError) -> Self {
        let (status, error_type) = match &err {
            UserStorageError::UserAlreadyExists(_) => (StatusCode::CONFLICT, "user_already_exists"),
            UserStorageError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
            UserStorageError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            UserStorageError::StorageError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error_type.to_owned(),
                message: err.to_string(),
            }),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user: UserProfile,
    /// Session token for the new user.
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// Create internal routes, guarded by the internal key when one is set.
pub fn create_internal_routes<S, U>(config: &Config) -> Router<AppState<S, U>>
where
    S: SqlStorage,
    U: UserStorage,
{
    let routes = Router::new()
        .route("/users", post(create_user::<S, U>))
        .route("/categories", post(create_category::<S, U>));

    match config.internal_api_key() {
        Some(key) => {
            let key: Arc<str> = Arc::from(key);
            routes.layer(middleware::from_fn(move |req, next| {
                let key = Arc::clone(&key);
                require_internal_key(key, req, next)
            }))
        }
        None if config.environment().is_development() => routes,
        None => {
            tracing::warn!(
                env = %config.environment(),
                "INTERNAL_API_KEY not configured in deployed environment - all internal requests will be rejected"
            );
            Router::new().fallback(any(internal_key_not_configured))
        }
    }
}

async fn require_internal_key(key: Arc<str>, req: Request, next: Next) -> Response {
    let provided = req
        .headers()
        .get(INTERNAL_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided.is_some_and(|provided| key_matches(provided, &key)) {
        next.run(req).await
    } else {
        tracing::warn!(uri = %req.uri(), "Rejected internal request with missing or wrong key");
        let error = ErrorResponse {
            error: "unauthorized".to_owned(),
            message: format!("A valid {INTERNAL_KEY_HEADER} header is required"),
        };
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

/// Constant-time comparison of a presented key against the configured one.
fn key_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Rejects requests when the internal key is missing in a deployed environment.
async fn internal_key_not_configured() -> Response {
    let error = serde_json::json!({
        "error": "internal_key_not_configured",
        "message": "Internal routes require an API key which is not configured"
    });
    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Create a user and issue a session token for them.
///
/// # Request
///
/// ```text
/// POST /internal/users
/// x-internal-key: <key>
/// ```
///
/// ```json
/// { "username": "alice", "email": "alice@example.com", "name": "Alice" }
/// ```
#[tracing::instrument(skip_all, fields(username = %payload.username))]
async fn create_user<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
    Json(payload): Json<CreateUserRequest>,
) -> Response
where
    S: SqlStorage,
    U: UserStorage,
{
    let user = match state
        .user_storage
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            name: payload.name,
            profile_picture: payload.profile_picture,
        })
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Failed to create user: {}", e);
            let (status, json): (StatusCode, Json<ErrorResponse>) = e.into();
            return (status, json).into_response();
        }
    };

    let token = match generate_session_token(user.id, &user.email, config.jwt_secret()) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to issue session token: {}", e);
            let (status, json): (StatusCode, Json<ErrorResponse>) =
                UserStorageError::StorageError("Failed to issue session token".to_owned()).into();
            return (status, json).into_response();
        }
    };

    tracing::info!(user_id = %user.id, "Created user");

    (
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user: user.into(),
            token,
        }),
    )
        .into_response()
}

async fn create_category<S, U>(
    State(state): State<AppState<S, U>>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let category = state.pins().create_category(&payload.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_matches() {
        assert!(key_matches("ops-secret", "ops-secret"));
        assert!(!key_matches("ops-secreT", "ops-secret"));
        assert!(!key_matches("ops", "ops-secret"));
        assert!(!key_matches("", "ops-secret"));
    }
}
