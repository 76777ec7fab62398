//! /v1/pins endpoint handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use super::types::V1SearchQuery;
use crate::auth::{OptionalAuth, RequireAuth};
use crate::database::SqlStorage;
use crate::pins::models::{NewPin, PinChanges};
use crate::pins::{PageQuery, PinsError};
use crate::users::{AppState, UserStorage};

/// Feed of pins, newest first.
///
/// ```text
/// GET /v1/pins?page=1&limit=20
/// ```
///
/// Anonymous callers are allowed; `liked` is then false on every item.
pub async fn list<S, U>(
    State(state): State<AppState<S, U>>,
    auth: OptionalAuth,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let pins = state.pins().list_pins(page, auth.user_id()).await?;
    Ok(Json(pins))
}

/// Case-insensitive search over descriptions and hashtags.
pub async fn search<S, U>(
    State(state): State<AppState<S, U>>,
    Query(query): Query<V1SearchQuery>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let pins = state.pins().search(&query.q).await?;
    Ok(Json(pins))
}

pub async fn get<S, U>(
    State(state): State<AppState<S, U>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let pin = state.pins().get_pin(id).await?;
    Ok(Json(pin))
}

/// Create a pin owned by the caller.
///
/// ```json
/// {
///     "image": "https://...",
///     "description": "Sunset over the bay",
///     "categoryId": "…",
///     "hashtags": ["#sunset", "bay"]
/// }
/// ```
pub async fn create<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Json(body): Json<NewPin>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let created = state.pins().create_pin(body, auth.user_id()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<PinChanges>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let pin = state.pins().update_pin(auth.user_id(), body, id).await?;
    Ok(Json(pin))
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
    let pin = state.pins().delete_pin(id, auth.user_id()).await?;
    Ok(Json(pin))
}

/// Like the pin, or remove the caller's like if present.
pub async fn toggle_like<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let like = state.pins().toggle_like(id, auth.user_id()).await?;
    Ok(Json(like))
}

pub async fn like_status<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let like = state.pins().like_status(id, auth.user_id()).await?;
    Ok(Json(like))
}

pub async fn record_view<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let view = state.pins().record_view(auth.user_id(), id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}
