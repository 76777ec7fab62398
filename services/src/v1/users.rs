//! Per-user pin listings.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use super::types::V1PinsCountResponse;
use crate::auth::OptionalAuth;
use crate::database::SqlStorage;
use crate::pins::{PageQuery, PinsError};
use crate::users::{AppState, UserStorage};

/// Pins authored by a user.
pub async fn pins<S, U>(
    State(state): State<AppState<S, U>>,
    auth: OptionalAuth,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let pins = state
        .pins()
        .pins_by_user(user_id, page, auth.user_id())
        .await?;
    Ok(Json(pins))
}

/// Pins a user has liked.
pub async fn liked<S, U>(
    State(state): State<AppState<S, U>>,
    auth: OptionalAuth,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let pins = state.pins().liked_pins(user_id, page, auth.user_id()).await?;
    Ok(Json(pins))
}

pub async fn pins_count<S, U>(
    State(state): State<AppState<S, U>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let pins_count = state.pins().user_pins_count(user_id).await?;
    Ok(Json(V1PinsCountResponse { pins_count }))
}
