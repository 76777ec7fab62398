//! User management module.
//!
//! This module provides user-related functionality including:
//! - Storage abstraction for user data
//! - The shared application state handed to every handler

pub mod storage;

pub use storage::{MockUserStorage, NewUser, PgUserStorage, StoredUser, UserStorage, UserStorageError};

use std::sync::Arc;

use crate::notifications::ActivityNotifier;

/// State shared by all routes.
///
/// # Type Parameters
///
/// * `S` - SQL storage implementation for pins and their related rows
/// * `U` - User storage implementation
#[derive(Clone)]
pub struct AppState<S, U> {
    pub sql_storage: S,
    pub user_storage: U,
    pub notifier: Arc<dyn ActivityNotifier>,
}

impl<S, U> AppState<S, U> {
    /// Creates a new `AppState` with the given storage implementations.
    pub fn new(sql_storage: S, user_storage: U, notifier: Arc<dyn ActivityNotifier>) -> Self {
        Self {
            sql_storage,
            user_storage,
            notifier,
        }
    }
}
