//! Relational storage for pins and the rows hanging off them.
//!
//! `SqlStorage` is the repository seam used by the pins service. It exposes
//! one method per query the service needs; each call is independent and no
//! call spans a transaction with another one. Counter columns are adjusted
//! through `pins_adjust_counter`, separately from the row that motivated the
//! adjustment.

mod mock;
mod pg;

pub use mock::MockSqlStorage;
pub use pg::PgStorage;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use uuid::Uuid;

use crate::config::Config;

/// Initialize a PostgreSQL connection pool, applying migrations when configured.
pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(config.database_url())
        .await?;

    tracing::info!("Database connection pool established");

    if config.run_migrations() {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}

#[derive(Debug, thiserror::Error)]
pub enum SqlStorageError {
    #[error("Database error: {0}")]
    Db(String),

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for SqlStorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return SqlStorageError::Conflict(db_err.message().to_owned());
        }
        SqlStorageError::Db(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct HashtagRow {
    pub id: Uuid,
    pub tag: String,
}

/// A pin together with its hashtags, ordered by tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRow {
    pub id: Uuid,
    pub image: String,
    pub description: String,
    pub likes_count: i32,
    pub comments_count: i32,
    pub views_count: i32,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub hashtags: Vec<HashtagRow>,
}

#[derive(Debug, Clone)]
pub struct PinInsert {
    pub image: String,
    pub description: String,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub hashtag_ids: Vec<Uuid>,
}

/// Partial pin update. `None` keeps the current value; `hashtag_ids`
/// replaces the whole hashtag set when present.
#[derive(Debug, Clone, Default)]
pub struct PinUpdate {
    pub image: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub hashtag_ids: Option<Vec<Uuid>>,
}

/// Denormalized counters kept on the pins table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinCounter {
    Likes,
    Comments,
    Views,
}

impl PinCounter {
    pub fn column(&self) -> &'static str {
        match self {
            PinCounter::Likes => "likes_count",
            PinCounter::Comments => "comments_count",
            PinCounter::Views => "views_count",
        }
    }
}

/// Offset/limit window over a newest-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinsPage {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LikeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pin_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentRow {
    pub id: Uuid,
    pub text: String,
    pub user_id: Uuid,
    pub pin_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaveRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pin_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ViewRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pin_id: Uuid,
    pub created_at: DateTime<Utc>,
}

pub trait SqlStorage: Clone + Send + Sync + 'static {
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    // Categories

    fn categories_get(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<CategoryRow>, SqlStorageError>> + Send;

    fn categories_list(
        &self,
    ) -> impl Future<Output = Result<Vec<CategoryRow>, SqlStorageError>> + Send;

    /// Fails with `Conflict` when the name is taken.
    fn categories_create(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<CategoryRow, SqlStorageError>> + Send;

    // Hashtags

    fn hashtags_find_by_tag(
        &self,
        tag: &str,
    ) -> impl Future<Output = Result<Option<HashtagRow>, SqlStorageError>> + Send;

    fn hashtags_get(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<HashtagRow>, SqlStorageError>> + Send;

    fn hashtags_create(
        &self,
        tag: &str,
    ) -> impl Future<Output = Result<HashtagRow, SqlStorageError>> + Send;

    fn hashtags_rename(
        &self,
        id: Uuid,
        tag: &str,
    ) -> impl Future<Output = Result<Option<HashtagRow>, SqlStorageError>> + Send;

    // Pins

    fn pins_insert(
        &self,
        input: PinInsert,
    ) -> impl Future<Output = Result<PinRow, SqlStorageError>> + Send;

    fn pins_get(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<PinRow>, SqlStorageError>> + Send;

    /// All pins, newest first.
    fn pins_list(
        &self,
        page: PinsPage,
    ) -> impl Future<Output = Result<Vec<PinRow>, SqlStorageError>> + Send;

    /// Pins authored by `user_id`, newest first.
    fn pins_list_for_user(
        &self,
        user_id: Uuid,
        page: PinsPage,
    ) -> impl Future<Output = Result<Vec<PinRow>, SqlStorageError>> + Send;

    /// Pins liked by `user_id`, newest pin first.
    fn pins_list_liked_by(
        &self,
        user_id: Uuid,
        page: PinsPage,
    ) -> impl Future<Output = Result<Vec<PinRow>, SqlStorageError>> + Send;

    /// Case-insensitive substring match on description or any hashtag.
    fn pins_search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<PinRow>, SqlStorageError>> + Send;

    fn pins_update(
        &self,
        id: Uuid,
        changes: PinUpdate,
    ) -> impl Future<Output = Result<Option<PinRow>, SqlStorageError>> + Send;

    /// Deletes the pin and everything referencing it. Returns `false` if absent.
    fn pins_delete(&self, id: Uuid) -> impl Future<Output = Result<bool, SqlStorageError>> + Send;

    /// Adds `delta` to a counter, never going below zero.
    fn pins_adjust_counter(
        &self,
        id: Uuid,
        counter: PinCounter,
        delta: i32,
    ) -> impl Future<Output = Result<(), SqlStorageError>> + Send;

    // Likes

    fn likes_find(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<LikeRow>, SqlStorageError>> + Send;

    /// Fails with `Conflict` when the pair already exists.
    fn likes_insert(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = Result<LikeRow, SqlStorageError>> + Send;

    fn likes_delete(&self, id: Uuid) -> impl Future<Output = Result<bool, SqlStorageError>> + Send;

    /// The subset of `pin_ids` that `user_id` has liked.
    fn likes_pin_ids_for_user(
        &self,
        user_id: Uuid,
        pin_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<Uuid>, SqlStorageError>> + Send;

    // Comments

    fn comments_get(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<CommentRow>, SqlStorageError>> + Send;

    /// Comments on a pin, oldest first.
    fn comments_list_for_pin(
        &self,
        pin_id: Uuid,
    ) -> impl Future<Output = Result<Vec<CommentRow>, SqlStorageError>> + Send;

    fn comments_insert(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
        text: &str,
    ) -> impl Future<Output = Result<CommentRow, SqlStorageError>> + Send;

    fn comments_update_text(
        &self,
        id: Uuid,
        text: &str,
    ) -> impl Future<Output = Result<Option<CommentRow>, SqlStorageError>> + Send;

    fn comments_delete(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, SqlStorageError>> + Send;

    // Views

    fn views_insert(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = Result<ViewRow, SqlStorageError>> + Send;

    // Saves

    fn saves_find(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<SaveRow>, SqlStorageError>> + Send;

    fn saves_get(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<SaveRow>, SqlStorageError>> + Send;

    /// Fails with `Conflict` when the pair already exists.
    fn saves_insert(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = Result<SaveRow, SqlStorageError>> + Send;

    fn saves_delete(&self, id: Uuid) -> impl Future<Output = Result<bool, SqlStorageError>> + Send;

    /// Pins saved by `user_id`, most recently saved first.
    fn saves_list_pins_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<PinRow>, SqlStorageError>> + Send;
}
