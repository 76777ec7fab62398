//! In-memory implementation of `SqlStorage`.
//!
//! Mirrors the PostgreSQL schema closely enough for handler and service
//! tests: unique (user, pin) pairs for likes and saves, cascading pin
//! deletes, and counters that never drop below zero. Listings are newest
//! first by insertion order.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use super::{
    CategoryRow, CommentRow, HashtagRow, LikeRow, PinCounter, PinInsert, PinRow, PinUpdate,
    PinsPage, SaveRow, SqlStorage, SqlStorageError, ViewRow,
};

#[derive(Default)]
struct Tables {
    categories: Vec<CategoryRow>,
    hashtags: Vec<HashtagRow>,
    pins: Vec<StoredPin>,
    likes: Vec<LikeRow>,
    comments: Vec<CommentRow>,
    saves: Vec<SaveRow>,
    views: Vec<ViewRow>,
}

#[derive(Clone)]
struct StoredPin {
    row: PinRow,
    hashtag_ids: Vec<Uuid>,
}

impl Tables {
    fn hydrate(&self, pin: &StoredPin) -> PinRow {
        let mut hashtags: Vec<HashtagRow> = self
            .hashtags
            .iter()
            .filter(|h| pin.hashtag_ids.contains(&h.id))
            .cloned()
            .collect();
        hashtags.sort_by(|a, b| a.tag.cmp(&b.tag));
        PinRow {
            hashtags,
            ..pin.row.clone()
        }
    }

    fn newest_first<'a>(
        &'a self,
        filter: impl Fn(&StoredPin) -> bool + 'a,
    ) -> impl Iterator<Item = PinRow> + 'a {
        self.pins
            .iter()
            .rev()
            .filter(move |p| filter(p))
            .map(|p| self.hydrate(p))
    }

    fn pin_mut(&mut self, id: Uuid) -> Option<&mut StoredPin> {
        self.pins.iter_mut().find(|p| p.row.id == id)
    }
}

fn window(rows: impl Iterator<Item = PinRow>, page: PinsPage) -> Vec<PinRow> {
    let offset = usize::try_from(page.offset).unwrap_or(0);
    let limit = usize::try_from(page.limit).unwrap_or(0);
    rows.skip(offset).take(limit).collect()
}

/// Shared, cloneable in-memory tables. Clones see the same data.
#[derive(Clone)]
pub struct MockSqlStorage {
    pub is_connected: bool,
    tables: Arc<RwLock<Tables>>,
}

impl Default for MockSqlStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSqlStorage {
    pub fn new() -> Self {
        Self {
            is_connected: true,
            tables: Arc::default(),
        }
    }

    /// Simulates a database that does not answer health checks.
    pub fn disconnected() -> Self {
        Self {
            is_connected: false,
            ..Self::new()
        }
    }

    /// Seeds a category with a known id (builder pattern).
    pub fn with_category(self, id: Uuid, name: impl Into<String>) -> Self {
        self.tables
            .write()
            .expect("lock poisoned")
            .categories
            .push(CategoryRow {
                id,
                name: name.into(),
                created_at: Utc::now(),
            });
        self
    }

    /// Number of like rows for a pin.
    pub fn like_count(&self, pin_id: Uuid) -> usize {
        let tables = self.tables.read().expect("lock poisoned");
        tables.likes.iter().filter(|l| l.pin_id == pin_id).count()
    }

    /// Number of comment rows for a pin.
    pub fn comment_count(&self, pin_id: Uuid) -> usize {
        let tables = self.tables.read().expect("lock poisoned");
        tables.comments.iter().filter(|c| c.pin_id == pin_id).count()
    }

    /// Number of view rows for a pin.
    pub fn view_count(&self, pin_id: Uuid) -> usize {
        let tables = self.tables.read().expect("lock poisoned");
        tables.views.iter().filter(|v| v.pin_id == pin_id).count()
    }

    /// Number of save rows for a pin.
    pub fn save_count(&self, pin_id: Uuid) -> usize {
        let tables = self.tables.read().expect("lock poisoned");
        tables.saves.iter().filter(|s| s.pin_id == pin_id).count()
    }
}

impl SqlStorage for MockSqlStorage {
    async fn is_connected(&self) -> bool {
        self.is_connected
    }

    async fn categories_get(&self, id: Uuid) -> Result<Option<CategoryRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn categories_list(&self) -> Result<Vec<CategoryRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        let mut rows = tables.categories.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn categories_create(&self, name: &str) -> Result<CategoryRow, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        if tables.categories.iter().any(|c| c.name == name) {
            return Err(SqlStorageError::Conflict(format!(
                "category {name} already exists"
            )));
        }
        let row = CategoryRow {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };
        tables.categories.push(row.clone());
        Ok(row)
    }

    async fn hashtags_find_by_tag(&self, tag: &str) -> Result<Option<HashtagRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.hashtags.iter().find(|h| h.tag == tag).cloned())
    }

    async fn hashtags_get(&self, id: Uuid) -> Result<Option<HashtagRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.hashtags.iter().find(|h| h.id == id).cloned())
    }

    async fn hashtags_create(&self, tag: &str) -> Result<HashtagRow, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        if tables.hashtags.iter().any(|h| h.tag == tag) {
            return Err(SqlStorageError::Conflict(format!(
                "hashtag {tag} already exists"
            )));
        }
        let row = HashtagRow {
            id: Uuid::new_v4(),
            tag: tag.to_owned(),
        };
        tables.hashtags.push(row.clone());
        Ok(row)
    }

    async fn hashtags_rename(
        &self,
        id: Uuid,
        tag: &str,
    ) -> Result<Option<HashtagRow>, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        if tables.hashtags.iter().any(|h| h.tag == tag && h.id != id) {
            return Err(SqlStorageError::Conflict(format!(
                "hashtag {tag} already exists"
            )));
        }
        Ok(tables.hashtags.iter_mut().find(|h| h.id == id).map(|h| {
            h.tag = tag.to_owned();
            h.clone()
        }))
    }

    async fn pins_insert(&self, input: PinInsert) -> Result<PinRow, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let mut hashtag_ids = input.hashtag_ids;
        hashtag_ids.dedup();
        let stored = StoredPin {
            row: PinRow {
                id: Uuid::new_v4(),
                image: input.image,
                description: input.description,
                likes_count: 0,
                comments_count: 0,
                views_count: 0,
                user_id: input.user_id,
                category_id: input.category_id,
                created_at: Utc::now(),
                hashtags: Vec::new(),
            },
            hashtag_ids,
        };
        let row = tables.hydrate(&stored);
        tables.pins.push(stored);
        Ok(row)
    }

    async fn pins_get(&self, id: Uuid) -> Result<Option<PinRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .pins
            .iter()
            .find(|p| p.row.id == id)
            .map(|p| tables.hydrate(p)))
    }

    async fn pins_list(&self, page: PinsPage) -> Result<Vec<PinRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(window(tables.newest_first(|_| true), page))
    }

    async fn pins_list_for_user(
        &self,
        user_id: Uuid,
        page: PinsPage,
    ) -> Result<Vec<PinRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(window(
            tables.newest_first(move |p| p.row.user_id == user_id),
            page,
        ))
    }

    async fn pins_list_liked_by(
        &self,
        user_id: Uuid,
        page: PinsPage,
    ) -> Result<Vec<PinRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        let liked: Vec<Uuid> = tables
            .likes
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| l.pin_id)
            .collect();
        Ok(window(
            tables.newest_first(move |p| liked.contains(&p.row.id)),
            page,
        ))
    }

    async fn pins_search(&self, query: &str) -> Result<Vec<PinRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        let needle = query.to_lowercase();
        Ok(tables
            .newest_first(|_| true)
            .filter(|pin| {
                pin.description.to_lowercase().contains(&needle)
                    || pin
                        .hashtags
                        .iter()
                        .any(|h| h.tag.to_lowercase().contains(&needle))
            })
            .collect())
    }

    async fn pins_update(
        &self,
        id: Uuid,
        changes: PinUpdate,
    ) -> Result<Option<PinRow>, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let Some(pin) = tables.pin_mut(id) else {
            return Ok(None);
        };
        if let Some(image) = changes.image {
            pin.row.image = image;
        }
        if let Some(description) = changes.description {
            pin.row.description = description;
        }
        if let Some(category_id) = changes.category_id {
            pin.row.category_id = category_id;
        }
        if let Some(hashtag_ids) = changes.hashtag_ids {
            pin.hashtag_ids = hashtag_ids;
        }
        let pin = pin.clone();
        Ok(Some(tables.hydrate(&pin)))
    }

    async fn pins_delete(&self, id: Uuid) -> Result<bool, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let before = tables.pins.len();
        tables.pins.retain(|p| p.row.id != id);
        if tables.pins.len() == before {
            return Ok(false);
        }
        tables.likes.retain(|l| l.pin_id != id);
        tables.comments.retain(|c| c.pin_id != id);
        tables.saves.retain(|s| s.pin_id != id);
        tables.views.retain(|v| v.pin_id != id);
        Ok(true)
    }

    async fn pins_adjust_counter(
        &self,
        id: Uuid,
        counter: PinCounter,
        delta: i32,
    ) -> Result<(), SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        if let Some(pin) = tables.pin_mut(id) {
            let value = match counter {
                PinCounter::Likes => &mut pin.row.likes_count,
                PinCounter::Comments => &mut pin.row.comments_count,
                PinCounter::Views => &mut pin.row.views_count,
            };
            *value = (*value + delta).max(0);
        }
        Ok(())
    }

    async fn likes_find(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<LikeRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .likes
            .iter()
            .find(|l| l.pin_id == pin_id && l.user_id == user_id)
            .cloned())
    }

    async fn likes_insert(&self, pin_id: Uuid, user_id: Uuid) -> Result<LikeRow, SqlStorageError> {
        // Yield like a database round-trip so overlapping requests interleave
        tokio::task::yield_now().await;
        let mut tables = self.tables.write().expect("lock poisoned");
        if tables
            .likes
            .iter()
            .any(|l| l.pin_id == pin_id && l.user_id == user_id)
        {
            return Err(SqlStorageError::Conflict("like already exists".to_owned()));
        }
        let row = LikeRow {
            id: Uuid::new_v4(),
            user_id,
            pin_id,
            created_at: Utc::now(),
        };
        tables.likes.push(row.clone());
        Ok(row)
    }

    async fn likes_delete(&self, id: Uuid) -> Result<bool, SqlStorageError> {
        // Yield like a database round-trip so overlapping requests interleave
        tokio::task::yield_now().await;
        let mut tables = self.tables.write().expect("lock poisoned");
        let before = tables.likes.len();
        tables.likes.retain(|l| l.id != id);
        Ok(tables.likes.len() != before)
    }

    async fn likes_pin_ids_for_user(
        &self,
        user_id: Uuid,
        pin_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .likes
            .iter()
            .filter(|l| l.user_id == user_id && pin_ids.contains(&l.pin_id))
            .map(|l| l.pin_id)
            .collect())
    }

    async fn comments_get(&self, id: Uuid) -> Result<Option<CommentRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn comments_list_for_pin(&self, pin_id: Uuid) -> Result<Vec<CommentRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .comments
            .iter()
            .filter(|c| c.pin_id == pin_id)
            .cloned()
            .collect())
    }

    async fn comments_insert(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
        text: &str,
    ) -> Result<CommentRow, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let row = CommentRow {
            id: Uuid::new_v4(),
            text: text.to_owned(),
            user_id,
            pin_id,
            created_at: Utc::now(),
        };
        tables.comments.push(row.clone());
        Ok(row)
    }

    async fn comments_update_text(
        &self,
        id: Uuid,
        text: &str,
    ) -> Result<Option<CommentRow>, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        Ok(tables.comments.iter_mut().find(|c| c.id == id).map(|c| {
            c.text = text.to_owned();
            c.clone()
        }))
    }

    async fn comments_delete(&self, id: Uuid) -> Result<bool, SqlStorageError> {
        // Yield like a database round-trip so overlapping requests interleave
        tokio::task::yield_now().await;
        let mut tables = self.tables.write().expect("lock poisoned");
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        Ok(tables.comments.len() != before)
    }

    async fn views_insert(&self, pin_id: Uuid, user_id: Uuid) -> Result<ViewRow, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let row = ViewRow {
            id: Uuid::new_v4(),
            user_id,
            pin_id,
            created_at: Utc::now(),
        };
        tables.views.push(row.clone());
        Ok(row)
    }

    async fn saves_find(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SaveRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .saves
            .iter()
            .find(|s| s.pin_id == pin_id && s.user_id == user_id)
            .cloned())
    }

    async fn saves_get(&self, id: Uuid) -> Result<Option<SaveRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.saves.iter().find(|s| s.id == id).cloned())
    }

    async fn saves_insert(&self, pin_id: Uuid, user_id: Uuid) -> Result<SaveRow, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        if tables
            .saves
            .iter()
            .any(|s| s.pin_id == pin_id && s.user_id == user_id)
        {
            return Err(SqlStorageError::Conflict("save already exists".to_owned()));
        }
        let row = SaveRow {
            id: Uuid::new_v4(),
            user_id,
            pin_id,
            created_at: Utc::now(),
        };
        tables.saves.push(row.clone());
        Ok(row)
    }

    async fn saves_delete(&self, id: Uuid) -> Result<bool, SqlStorageError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let before = tables.saves.len();
        tables.saves.retain(|s| s.id != id);
        Ok(tables.saves.len() != before)
    }

    async fn saves_list_pins_for_user(&self, user_id: Uuid) -> Result<Vec<PinRow>, SqlStorageError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .saves
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .filter_map(|s| tables.pins.iter().find(|p| p.row.id == s.pin_id))
            .map(|p| tables.hydrate(p))
            .collect())
    }
}
