//! V1 API module containing all versioned API endpoints.
//!
//! This module organizes the V1 API into sub-modules by resource:
//! - `me` - User profile endpoint
//! - `categories` - Category listing
//! - `pins` - Pins, likes and views
//! - `comments` - Comments on pins
//! - `saves` - Saved pins
//! - `users` - Per-user listings
//! - `types` - Shared types (error responses, etc.)

pub mod categories;
pub mod comments;
pub mod me;
pub mod pins;
pub mod saves;
pub mod types;
pub mod users;

use crate::database::SqlStorage;
use crate::users::{AppState, UserStorage};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Creates the V1 API router with all endpoints.
pub fn routes<S, U>() -> Router<AppState<S, U>>
where
    S: SqlStorage,
    U: UserStorage,
{
    Router::new()
        // Me endpoint
        .route("/me", get(me::handler::<S, U>))
        .route("/categories", get(categories::list::<S, U>))
        // Pins endpoints
        .route("/pins", get(pins::list::<S, U>).post(pins::create::<S, U>))
        .route("/pins/search", get(pins::search::<S, U>))
        .route(
            "/pins/{id}",
            get(pins::get::<S, U>)
                .patch(pins::update::<S, U>)
                .delete(pins::delete::<S, U>),
        )
        .route(
            "/pins/{id}/like",
            get(pins::like_status::<S, U>).post(pins::toggle_like::<S, U>),
        )
        .route("/pins/{id}/views", post(pins::record_view::<S, U>))
        // Comments endpoints
        .route(
            "/pins/{id}/comments",
            get(comments::list::<S, U>).post(comments::create::<S, U>),
        )
        .route(
            "/comments/{id}",
            patch(comments::update::<S, U>).delete(comments::delete::<S, U>),
        )
        // Saves endpoints
        .route("/pins/{id}/save", post(saves::create::<S, U>))
        .route("/saves", get(saves::list::<S, U>))
        .route("/saves/{id}", axum::routing::delete(saves::delete::<S, U>))
        // Users endpoints
        .route("/users/{id}/pins", get(users::pins::<S, U>))
        .route("/users/{id}/liked", get(users::liked::<S, U>))
        .route("/users/{id}/pins/count", get(users::pins_count::<S, U>))
}
