//! User storage trait and implementations.
//!
//! Users are owned by the identity collaborator; this service only reads
//! them, keeps their `pins_count` up to date, and creates them through the
//! internal routes.
//!
//! # Architecture
//!
//! - `UserStorage` trait: the interface the pins service depends on
//! - `PgUserStorage`: PostgreSQL implementation using the existing `PgStorage`
//! - `MockUserStorage`: In-memory implementation for testing

use crate::database::PgStorage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use uuid::Uuid;

/// A user as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Display name (optional).
    pub name: Option<String>,
    /// Avatar URL (optional).
    pub profile_picture: Option<String>,
    /// Number of pins the user has authored.
    pub pins_count: i32,
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    /// Creates a new `StoredUser` instance with a generated UUID.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), username, email)
    }

    /// Creates a new `StoredUser` instance with a specific UUID.
    pub fn with_id(id: Uuid, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            name: None,
            profile_picture: None,
            pins_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name shown next to comments: the display name, else the username,
    /// else `"Anonymous"`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(Some(self.username.as_str()).filter(|u| !u.is_empty()))
            .unwrap_or("Anonymous")
    }
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
}

impl NewUser {
    fn validate(&self) -> Result<(), UserStorageError> {
        if self.username.trim().is_empty() {
            return Err(UserStorageError::InvalidInput(
                "Username cannot be empty".to_owned(),
            ));
        }
        if self.email.trim().is_empty() {
            return Err(UserStorageError::InvalidInput(
                "Email cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Error type for user storage operations.
#[derive(Debug, thiserror::Error)]
pub enum UserStorageError {
    /// The username or email is already taken.
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A database or storage error occurred.
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Trait for user storage operations.
pub trait UserStorage: Clone + Send + Sync + 'static {
    /// Creates a new user. Fails with `UserAlreadyExists` when the username
    /// or email is taken.
    fn create_user(
        &self,
        user: NewUser,
    ) -> impl Future<Output = Result<StoredUser, UserStorageError>> + Send;

    fn get_user_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<StoredUser>, UserStorageError>> + Send;

    /// Batch lookup. Unknown ids are skipped; order is unspecified.
    fn get_users_by_ids(
        &self,
        ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<StoredUser>, UserStorageError>> + Send;

    /// Adds `delta` to the user's pin count (never below zero) and returns
    /// the new value.
    fn adjust_pins_count(
        &self,
        id: Uuid,
        delta: i32,
    ) -> impl Future<Output = Result<i32, UserStorageError>> + Send;
}

/// In-memory mock implementation of `UserStorage` for testing.
#[derive(Clone, Default)]
pub struct MockUserStorage {
    pub(crate) users: std::sync::Arc<std::sync::RwLock<std::collections::HashMap<Uuid, StoredUser>>>,
}

impl MockUserStorage {
    /// Creates a new empty `MockUserStorage`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `MockUserStorage` pre-populated with `(username, email)` pairs.
    pub fn with_users<I, S1, S2>(users: I) -> Self
    where
        I: IntoIterator<Item = (S1, S2)>,
        S1: Into<String>,
        S2: Into<String>,
    {
        users
            .into_iter()
            .fold(Self::new(), |storage, (username, email)| {
                storage.with_user(StoredUser::new(username, email))
            })
    }

    /// Inserts a user with a specific ID into the storage (builder pattern).
    ///
    /// Useful for integration tests that need to coordinate user IDs with
    /// issued session tokens.
    pub fn with_user(self, user: StoredUser) -> Self {
        self.users
            .write()
            .expect("lock poisoned")
            .insert(user.id, user);
        self
    }

    pub fn len(&self) -> usize {
        self.users.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserStorage for MockUserStorage {
    async fn create_user(&self, user: NewUser) -> Result<StoredUser, UserStorageError> {
        user.validate()?;

        let mut users = self.users.write().expect("lock poisoned");

        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(UserStorageError::UserAlreadyExists(user.username));
        }

        let stored = StoredUser {
            name: user.name,
            profile_picture: user.profile_picture,
            ..StoredUser::new(user.username, user.email)
        };
        users.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<StoredUser>, UserStorageError> {
        let users = self.users.read().expect("lock poisoned");
        Ok(users.get(&id).cloned())
    }

    async fn get_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<StoredUser>, UserStorageError> {
        let users = self.users.read().expect("lock poisoned");
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn adjust_pins_count(&self, id: Uuid, delta: i32) -> Result<i32, UserStorageError> {
        let mut users = self.users.write().expect("lock poisoned");
        let user = users
            .get_mut(&id)
            .ok_or_else(|| UserStorageError::UserNotFound(id.to_string()))?;
        user.pins_count = (user.pins_count + delta).max(0);
        Ok(user.pins_count)
    }
}

/// PostgreSQL implementation of `UserStorage`.
#[derive(Clone)]
pub struct PgUserStorage {
    storage: PgStorage,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    name: Option<String>,
    profile_picture: Option<String>,
    pins_count: i32,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for StoredUser {
    fn from(row: UserRow) -> Self {
        StoredUser {
            id: row.id,
            username: row.username,
            email: row.email,
            name: row.name,
            profile_picture: row.profile_picture,
            pins_count: row.pins_count,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, name, profile_picture, pins_count, created_at";

impl PgUserStorage {
    /// Creates a new `PgUserStorage` instance wrapping the given `PgStorage`.
    pub fn new(storage: PgStorage) -> Self {
        Self { storage }
    }
}

fn storage_error(err: sqlx::Error) -> UserStorageError {
    UserStorageError::StorageError(err.to_string())
}

impl UserStorage for PgUserStorage {
    async fn create_user(&self, user: NewUser) -> Result<StoredUser, UserStorageError> {
        user.validate()?;

        let result = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, email, name, profile_picture)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.profile_picture)
        .fetch_optional(&self.storage.pool)
        .await
        .map_err(storage_error)?;

        result
            .map(StoredUser::from)
            .ok_or(UserStorageError::UserAlreadyExists(user.username))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<StoredUser>, UserStorageError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.storage.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(StoredUser::from))
    }

    async fn get_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<StoredUser>, UserStorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.storage.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows.into_iter().map(StoredUser::from).collect())
    }

    async fn adjust_pins_count(&self, id: Uuid, delta: i32) -> Result<i32, UserStorageError> {
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET pins_count = GREATEST(pins_count + $2, 0)
            WHERE id = $1
            RETURNING pins_count
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.storage.pool)
        .await
        .map_err(storage_error)?;

        count.ok_or_else(|| UserStorageError::UserNotFound(id.to_string()))
    }
}
