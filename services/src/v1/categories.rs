//! /v1/categories endpoint handler.

use axum::{Json, extract::State, response::IntoResponse};

use crate::database::SqlStorage;
use crate::pins::PinsError;
use crate::users::{AppState, UserStorage};

/// All categories, ordered by name.
pub async fn list<S, U>(
    State(state): State<AppState<S, U>>,
) -> Result<impl IntoResponse, PinsError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let categories = state.pins().list_categories().await?;
    Ok(Json(categories))
}
