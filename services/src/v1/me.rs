//! /v1/me endpoint handler.

use crate::auth::RequireAuth;
use crate::database::SqlStorage;
use crate::pins::PinsError;
use crate::users::{AppState, UserStorage};
use axum::{Json, extract::State, response::IntoResponse};

/// Get the current authenticated user's profile.
///
/// # Request
///
/// ```text
/// GET /v1/me
/// Cookie: jwt=<session_token>
/// ```
///
/// # Response
///
/// ```json
/// {
///     "id": "…",
///     "username": "alice",
///     "email": "alice@example.com",
///     "name": "Alice",
///     "avatar": null,
///     "pinsCount": 3
/// }
/// ```
///
/// # Errors
///
/// - 401 Unauthorized: Missing or invalid token
/// - 404 Not Found: The token names a user that does not exist
pub async fn handler<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let profile = state.pins().me(auth.user_id()).await?;
    Ok(Json(profile))
}
