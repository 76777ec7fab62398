//! Saved pins endpoint handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::auth::RequireAuth;
use crate::database::SqlStorage;
use crate::pins::PinsError;
use crate::users::{AppState, UserStorage};

/// Pins saved by the caller, most recently saved first.
pub async fn list<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let pins = state.pins().list_saved(auth.user_id()).await?;
    Ok(Json(pins))
}

pub async fn create<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(pin_id): Path<Uuid>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let save = state.pins().save_pin(pin_id, auth.user_id()).await?;
    Ok((StatusCode::CREATED, Json(save)))
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
    state.pins().delete_save(id, auth.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
