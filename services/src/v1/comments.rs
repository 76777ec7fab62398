//! Comment endpoint handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use super::types::V1CommentRequest;
use crate::auth::RequireAuth;
use crate::database::SqlStorage;
use crate::pins::PinsError;
use crate::users::{AppState, UserStorage};

/// Comments on a pin, oldest first. Unknown pins yield `[]`.
pub async fn list<S, U>(
    State(state): State<AppState<S, U>>,
    Path(pin_id): Path<Uuid>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let comments = state.pins().list_comments(pin_id).await?;
    Ok(Json(comments))
}

pub async fn create<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(pin_id): Path<Uuid>,
    Json(body): Json<V1CommentRequest>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let comment = state
        .pins()
        .create_comment(auth.user_id(), pin_id, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn update<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<V1CommentRequest>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let comment = state
        .pins()
        .update_comment(id, &body.text, auth.user_id())
        .await?;
    Ok(Json(comment))
}

pub async fn delete<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let comment = state.pins().delete_comment(id, auth.user_id()).await?;
    Ok(Json(comment))
}
