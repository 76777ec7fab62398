//! PostgreSQL implementation of `SqlStorage`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CategoryRow, CommentRow, HashtagRow, LikeRow, PinCounter, PinInsert, PinRow, PinUpdate,
    PinsPage, SaveRow, SqlStorage, SqlStorageError, ViewRow,
};

const PIN_COLUMNS: &str = "p.id, p.image, p.description, p.likes_count, p.comments_count, \
                           p.views_count, p.user_id, p.category_id, p.created_at";

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the hashtags of every pin in `records` with a single query.
    async fn with_hashtags(&self, records: Vec<PinRecord>) -> Result<Vec<PinRow>, SqlStorageError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let pin_ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let links = sqlx::query_as::<_, PinHashtagLink>(
            r#"
            SELECT ph.pin_id, h.id, h.tag
            FROM pin_hashtags ph
            INNER JOIN hashtags h ON h.id = ph.hashtag_id
            WHERE ph.pin_id = ANY($1)
            ORDER BY h.tag
            "#,
        )
        .bind(&pin_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_pin: HashMap<Uuid, Vec<HashtagRow>> = HashMap::new();
        for link in links {
            by_pin.entry(link.pin_id).or_default().push(HashtagRow {
                id: link.id,
                tag: link.tag,
            });
        }

        Ok(records
            .into_iter()
            .map(|record| {
                let hashtags = by_pin.remove(&record.id).unwrap_or_default();
                record.into_pin(hashtags)
            })
            .collect())
    }

    async fn fetch_pin(&self, id: Uuid) -> Result<Option<PinRow>, SqlStorageError> {
        let record = sqlx::query_as::<_, PinRecord>(&format!(
            "SELECT {PIN_COLUMNS} FROM pins p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match record {
            Some(record) => Ok(self.with_hashtags(vec![record]).await?.pop()),
            None => Ok(None),
        }
    }
}

/// A pins row without its hashtags.
#[derive(sqlx::FromRow)]
struct PinRecord {
    id: Uuid,
    image: String,
    description: String,
    likes_count: i32,
    comments_count: i32,
    views_count: i32,
    user_id: Uuid,
    category_id: Uuid,
    created_at: DateTime<Utc>,
}

impl PinRecord {
    fn into_pin(self, hashtags: Vec<HashtagRow>) -> PinRow {
        PinRow {
            id: self.id,
            image: self.image,
            description: self.description,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
            views_count: self.views_count,
            user_id: self.user_id,
            category_id: self.category_id,
            created_at: self.created_at,
            hashtags,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PinHashtagLink {
    pin_id: Uuid,
    id: Uuid,
    tag: String,
}

/// Turns user input into an ILIKE pattern matching it literally anywhere.
pub(crate) fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl SqlStorage for PgStorage {
    async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn categories_get(&self, id: Uuid) -> Result<Option<CategoryRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn categories_list(&self) -> Result<Vec<CategoryRow>, SqlStorageError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn categories_create(&self, name: &str) -> Result<CategoryRow, SqlStorageError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn hashtags_find_by_tag(&self, tag: &str) -> Result<Option<HashtagRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, HashtagRow>("SELECT id, tag FROM hashtags WHERE tag = $1")
            .bind(tag)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn hashtags_get(&self, id: Uuid) -> Result<Option<HashtagRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, HashtagRow>("SELECT id, tag FROM hashtags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn hashtags_create(&self, tag: &str) -> Result<HashtagRow, SqlStorageError> {
        let row = sqlx::query_as::<_, HashtagRow>(
            "INSERT INTO hashtags (tag) VALUES ($1) RETURNING id, tag",
        )
        .bind(tag)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn hashtags_rename(
        &self,
        id: Uuid,
        tag: &str,
    ) -> Result<Option<HashtagRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, HashtagRow>(
            "UPDATE hashtags SET tag = $2 WHERE id = $1 RETURNING id, tag",
        )
        .bind(id)
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn pins_insert(&self, input: PinInsert) -> Result<PinRow, SqlStorageError> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, PinRecord>(
            r#"
            INSERT INTO pins (image, description, user_id, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, image, description, likes_count, comments_count, views_count,
                      user_id, category_id, created_at
            "#,
        )
        .bind(&input.image)
        .bind(&input.description)
        .bind(input.user_id)
        .bind(input.category_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO pin_hashtags (pin_id, hashtag_id) SELECT $1, UNNEST($2::uuid[]) \
             ON CONFLICT DO NOTHING",
        )
        .bind(record.id)
        .bind(&input.hashtag_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.fetch_pin(record.id)
            .await?
            .ok_or_else(|| SqlStorageError::Db(format!("pin {} vanished after insert", record.id)))
    }

    async fn pins_get(&self, id: Uuid) -> Result<Option<PinRow>, SqlStorageError> {
        self.fetch_pin(id).await
    }

    async fn pins_list(&self, page: PinsPage) -> Result<Vec<PinRow>, SqlStorageError> {
        let records = sqlx::query_as::<_, PinRecord>(&format!(
            "SELECT {PIN_COLUMNS} FROM pins p ORDER BY p.created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        self.with_hashtags(records).await
    }

    async fn pins_list_for_user(
        &self,
        user_id: Uuid,
        page: PinsPage,
    ) -> Result<Vec<PinRow>, SqlStorageError> {
        let records = sqlx::query_as::<_, PinRecord>(&format!(
            "SELECT {PIN_COLUMNS} FROM pins p WHERE p.user_id = $1 \
             ORDER BY p.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        self.with_hashtags(records).await
    }

    async fn pins_list_liked_by(
        &self,
        user_id: Uuid,
        page: PinsPage,
    ) -> Result<Vec<PinRow>, SqlStorageError> {
        let records = sqlx::query_as::<_, PinRecord>(&format!(
            "SELECT {PIN_COLUMNS} FROM pins p \
             INNER JOIN likes l ON l.pin_id = p.id AND l.user_id = $1 \
             ORDER BY p.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        self.with_hashtags(records).await
    }

    async fn pins_search(&self, query: &str) -> Result<Vec<PinRow>, SqlStorageError> {
        let records = sqlx::query_as::<_, PinRecord>(&format!(
            "SELECT {PIN_COLUMNS} FROM pins p \
             WHERE p.description ILIKE $1 \
                OR EXISTS ( \
                    SELECT 1 FROM pin_hashtags ph \
                    INNER JOIN hashtags h ON h.id = ph.hashtag_id \
                    WHERE ph.pin_id = p.id AND h.tag ILIKE $1) \
             ORDER BY p.created_at DESC"
        ))
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        self.with_hashtags(records).await
    }

    async fn pins_update(
        &self,
        id: Uuid,
        changes: PinUpdate,
    ) -> Result<Option<PinRow>, SqlStorageError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE pins
            SET image = COALESCE($2, image),
                description = COALESCE($3, description),
                category_id = COALESCE($4, category_id)
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.image)
        .bind(changes.description)
        .bind(changes.category_id)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }

        if let Some(hashtag_ids) = changes.hashtag_ids {
            sqlx::query("DELETE FROM pin_hashtags WHERE pin_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO pin_hashtags (pin_id, hashtag_id) SELECT $1, UNNEST($2::uuid[]) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(&hashtag_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.fetch_pin(id).await
    }

    async fn pins_delete(&self, id: Uuid) -> Result<bool, SqlStorageError> {
        let result = sqlx::query("DELETE FROM pins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn pins_adjust_counter(
        &self,
        id: Uuid,
        counter: PinCounter,
        delta: i32,
    ) -> Result<(), SqlStorageError> {
        let column = counter.column();
        sqlx::query(&format!(
            "UPDATE pins SET {column} = GREATEST({column} + $2, 0) WHERE id = $1"
        ))
        .bind(id)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn likes_find(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<LikeRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, LikeRow>(
            "SELECT id, user_id, pin_id, created_at FROM likes WHERE pin_id = $1 AND user_id = $2",
        )
        .bind(pin_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn likes_insert(&self, pin_id: Uuid, user_id: Uuid) -> Result<LikeRow, SqlStorageError> {
        let row = sqlx::query_as::<_, LikeRow>(
            "INSERT INTO likes (pin_id, user_id) VALUES ($1, $2) \
             RETURNING id, user_id, pin_id, created_at",
        )
        .bind(pin_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn likes_delete(&self, id: Uuid) -> Result<bool, SqlStorageError> {
        let result = sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn likes_pin_ids_for_user(
        &self,
        user_id: Uuid,
        pin_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, SqlStorageError> {
        if pin_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT pin_id FROM likes WHERE user_id = $1 AND pin_id = ANY($2)",
        )
        .bind(user_id)
        .bind(pin_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn comments_get(&self, id: Uuid) -> Result<Option<CommentRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, text, user_id, pin_id, created_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn comments_list_for_pin(&self, pin_id: Uuid) -> Result<Vec<CommentRow>, SqlStorageError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, text, user_id, pin_id, created_at FROM comments \
             WHERE pin_id = $1 ORDER BY created_at ASC",
        )
        .bind(pin_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn comments_insert(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
        text: &str,
    ) -> Result<CommentRow, SqlStorageError> {
        let row = sqlx::query_as::<_, CommentRow>(
            "INSERT INTO comments (pin_id, user_id, text) VALUES ($1, $2, $3) \
             RETURNING id, text, user_id, pin_id, created_at",
        )
        .bind(pin_id)
        .bind(user_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn comments_update_text(
        &self,
        id: Uuid,
        text: &str,
    ) -> Result<Option<CommentRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, CommentRow>(
            "UPDATE comments SET text = $2 WHERE id = $1 \
             RETURNING id, text, user_id, pin_id, created_at",
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn comments_delete(&self, id: Uuid) -> Result<bool, SqlStorageError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn views_insert(&self, pin_id: Uuid, user_id: Uuid) -> Result<ViewRow, SqlStorageError> {
        let row = sqlx::query_as::<_, ViewRow>(
            "INSERT INTO views (pin_id, user_id) VALUES ($1, $2) \
             RETURNING id, user_id, pin_id, created_at",
        )
        .bind(pin_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn saves_find(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SaveRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, SaveRow>(
            "SELECT id, user_id, pin_id, created_at FROM saves WHERE pin_id = $1 AND user_id = $2",
        )
        .bind(pin_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn saves_get(&self, id: Uuid) -> Result<Option<SaveRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, SaveRow>(
            "SELECT id, user_id, pin_id, created_at FROM saves WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn saves_insert(&self, pin_id: Uuid, user_id: Uuid) -> Result<SaveRow, SqlStorageError> {
        let row = sqlx::query_as::<_, SaveRow>(
            "INSERT INTO saves (pin_id, user_id) VALUES ($1, $2) \
             RETURNING id, user_id, pin_id, created_at",
        )
        .bind(pin_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn saves_delete(&self, id: Uuid) -> Result<bool, SqlStorageError> {
        let result = sqlx::query("DELETE FROM saves WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn saves_list_pins_for_user(&self, user_id: Uuid) -> Result<Vec<PinRow>, SqlStorageError> {
        let records = sqlx::query_as::<_, PinRecord>(&format!(
            "SELECT {PIN_COLUMNS} FROM pins p \
             INNER JOIN saves s ON s.pin_id = p.id AND s.user_id = $1 \
             ORDER BY s.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_hashtags(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_pattern_wraps_query() {
        assert_eq!(contains_pattern("cat"), "%cat%");
        assert_eq!(contains_pattern(""), "%%");
    }

    #[test]
    fn contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("c:\\"), "%c:\\\\%");
    }
}
