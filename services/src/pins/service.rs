//! Business operations on pins and the rows hanging off them.
//!
//! Every operation resolves the acting user before touching anything and
//! adjusts denormalized counters as separate storage calls next to the row
//! change that motivated them.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};
use uuid::Uuid;

use super::error::PinsError;
use super::hashtags::{normalize_tag, normalize_tags};
use super::models::{
    AuthorRef, CategoryRef, CommentView, CreatedComment, CreatedPin, LikeState, NewPin,
    PinChanges, PinDetail, PinListItem, PinRef, PinView, UserProfile,
};
use super::pagination::PageQuery;
use crate::database::{
    CategoryRow, CommentRow, HashtagRow, PinCounter, PinInsert, PinRow, PinUpdate, SaveRow,
    SqlStorage, SqlStorageError, ViewRow,
};
use crate::notifications::{ActivityEvent, ActivityNotifier, dispatch};
use crate::users::{AppState, StoredUser, UserStorage};

const USER_NOT_FOUND: &str = "User not found.";
const POST_NOT_FOUND: &str = "Post not found.";
const PIN_NOT_FOUND: &str = "Pin not found";
const ALREADY_SAVED: &str = "This post is already saved.";

pub type PinsResult<T> = Result<T, PinsError>;

/// Pins operations bound to a pair of storages and a notifier.
pub struct PinsService<'a, S, U> {
    sql: &'a S,
    users: &'a U,
    notifier: &'a dyn ActivityNotifier,
}

impl<S, U> AppState<S, U>
where
    S: SqlStorage,
    U: UserStorage,
{
    pub fn pins(&self) -> PinsService<'_, S, U> {
        PinsService::new(&self.sql_storage, &self.user_storage, self.notifier.as_ref())
    }
}

impl<'a, S, U> PinsService<'a, S, U>
where
    S: SqlStorage,
    U: UserStorage,
{
    pub fn new(sql: &'a S, users: &'a U, notifier: &'a dyn ActivityNotifier) -> Self {
        Self {
            sql,
            users,
            notifier,
        }
    }

    async fn require_user(&self, user_id: Uuid) -> PinsResult<StoredUser> {
        self.users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| PinsError::not_found(USER_NOT_FOUND))
    }

    async fn require_pin(&self, pin_id: Uuid, missing: &str) -> PinsResult<PinRow> {
        self.sql
            .pins_get(pin_id)
            .await?
            .ok_or_else(|| PinsError::not_found(missing))
    }

    async fn require_category(&self, category_id: Uuid) -> PinsResult<CategoryRow> {
        self.sql
            .categories_get(category_id)
            .await?
            .ok_or_else(|| PinsError::not_found("Category not found."))
    }

    async fn users_by_id(
        &self,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> PinsResult<HashMap<Uuid, StoredUser>> {
        let ids: Vec<Uuid> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
        let users = self.users.get_users_by_ids(&ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    /// Decorates rows with author usernames and the viewer's like flags.
    async fn list_items(
        &self,
        rows: Vec<PinRow>,
        viewer: Option<Uuid>,
    ) -> PinsResult<Vec<PinListItem>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let authors = self.users_by_id(rows.iter().map(|p| p.user_id)).await?;

        let liked: HashSet<Uuid> = match viewer {
            Some(viewer) => {
                let pin_ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();
                let liked = self.sql.likes_pin_ids_for_user(viewer, &pin_ids).await?;
                debug!(viewer = %viewer, liked = liked.len(), "Resolved viewer likes");
                liked.into_iter().collect()
            }
            None => HashSet::new(),
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let is_liked = liked.contains(&row.id);
                let author = authors.get(&row.user_id);
                PinListItem::new(row, author, is_liked)
            })
            .collect())
    }

    async fn comment_views(&self, rows: Vec<CommentRow>) -> PinsResult<Vec<CommentView>> {
        let authors = self.users_by_id(rows.iter().map(|c| c.user_id)).await?;
        Ok(rows
            .into_iter()
            .map(|row| CommentView::new(row, &authors))
            .collect())
    }

    /// Looks up a hashtag by text, creating it when absent.
    async fn find_or_create_hashtag(&self, tag: &str) -> PinsResult<HashtagRow> {
        if let Some(existing) = self.sql.hashtags_find_by_tag(tag).await? {
            return Ok(existing);
        }
        match self.sql.hashtags_create(tag).await {
            Ok(created) => Ok(created),
            // Created concurrently by another request
            Err(SqlStorageError::Conflict(_)) => self
                .sql
                .hashtags_find_by_tag(tag)
                .await?
                .ok_or_else(|| PinsError::bad_request(format!("Hashtag {tag} is unavailable"))),
            Err(err) => Err(err.into()),
        }
    }

    // Pins

    pub async fn search(&self, query: &str) -> PinsResult<Vec<PinView>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.sql.pins_search(query).await?;
        debug!(query, results = rows.len(), "Searched pins");
        Ok(rows.into_iter().map(PinView::from).collect())
    }

    pub async fn list_pins(
        &self,
        page: PageQuery,
        viewer: Option<Uuid>,
    ) -> PinsResult<Vec<PinListItem>> {
        let rows = self.sql.pins_list(page.window()).await?;
        self.list_items(rows, viewer).await
    }

    pub async fn get_pin(&self, pin_id: Uuid) -> PinsResult<PinDetail> {
        let pin = self.require_pin(pin_id, PIN_NOT_FOUND).await?;
        let owner = self.users.get_user_by_id(pin.user_id).await?;
        let comments = self.sql.comments_list_for_pin(pin.id).await?;
        let comments = self.comment_views(comments).await?;

        Ok(PinDetail {
            id: pin.id,
            name: owner.map(|u| u.username).unwrap_or_default(),
            user_id: pin.user_id,
            image: pin.image,
            description: pin.description,
            likes: pin.likes_count,
            comment: pin.comments_count,
            views: pin.views_count,
            comments,
            hashtag: pin.hashtags,
            created: pin.created_at,
        })
    }

    pub async fn create_pin(&self, input: NewPin, user_id: Uuid) -> PinsResult<CreatedPin> {
        if input.image.trim().is_empty() {
            return Err(PinsError::bad_request("image must not be empty"));
        }

        let category = self.require_category(input.category_id).await?;
        let user = self.require_user(user_id).await?;

        let mut hashtag_ids = Vec::new();
        for tag in normalize_tags(&input.hashtags) {
            hashtag_ids.push(self.find_or_create_hashtag(&tag).await?.id);
        }

        let post = self.users.adjust_pins_count(user.id, 1).await?;
        let pin = self
            .sql
            .pins_insert(PinInsert {
                image: input.image,
                description: input.description,
                user_id: user.id,
                category_id: category.id,
                hashtag_ids,
            })
            .await?;

        info!(pin_id = %pin.id, user_id = %user.id, "Created pin");

        Ok(CreatedPin {
            id: pin.id,
            category: CategoryRef::from(category),
            user: AuthorRef { id: user.id, post },
            image: pin.image,
            description: pin.description,
            like: pin.likes_count,
            comment: pin.comments_count,
            view: pin.views_count,
            hashtag: pin.hashtags,
            date: pin.created_at,
        })
    }

    pub async fn update_pin(
        &self,
        user_id: Uuid,
        changes: PinChanges,
        pin_id: Uuid,
    ) -> PinsResult<PinView> {
        let user = self.require_user(user_id).await?;
        let pin = self.require_pin(pin_id, POST_NOT_FOUND).await?;
        if pin.user_id != user.id {
            return Err(PinsError::forbidden(
                "You are not allowed to modify this post.",
            ));
        }

        if let Some(category_id) = changes.category_id {
            self.require_category(category_id).await?;
        }

        let hashtag_ids = match changes.hashtags {
            Some(edits) => {
                // Validate every edit before the first rename is written
                let mut renames: Vec<(Uuid, String)> = Vec::with_capacity(edits.len());
                for edit in edits {
                    if self.sql.hashtags_get(edit.id).await?.is_none() {
                        return Err(PinsError::not_found("Hashtag with id not found."));
                    }
                    let tag = normalize_tag(&edit.tag)
                        .ok_or_else(|| PinsError::bad_request("Hashtag tag must not be empty"))?;
                    let taken_elsewhere = match self.sql.hashtags_find_by_tag(&tag).await? {
                        Some(existing) => existing.id != edit.id,
                        None => false,
                    };
                    if taken_elsewhere
                        || renames.iter().any(|(id, t)| *t == tag && *id != edit.id)
                    {
                        return Err(PinsError::bad_request(format!(
                            "Hashtag {tag} already exists."
                        )));
                    }
                    renames.push((edit.id, tag));
                }

                let mut ids = Vec::with_capacity(renames.len());
                for (id, tag) in renames {
                    match self.sql.hashtags_rename(id, &tag).await {
                        Ok(_) => {}
                        Err(SqlStorageError::Conflict(_)) => {
                            return Err(PinsError::bad_request(format!(
                                "Hashtag {tag} already exists."
                            )));
                        }
                        Err(err) => return Err(err.into()),
                    }
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                Some(ids)
            }
            None => None,
        };

        let updated = self
            .sql
            .pins_update(
                pin.id,
                PinUpdate {
                    image: changes.image,
                    description: changes.description,
                    category_id: changes.category_id,
                    hashtag_ids,
                },
            )
            .await?
            .ok_or_else(|| PinsError::not_found(POST_NOT_FOUND))?;

        info!(pin_id = %pin.id, user_id = %user.id, "Updated pin");
        Ok(updated.into())
    }

    pub async fn delete_pin(&self, pin_id: Uuid, user_id: Uuid) -> PinsResult<PinView> {
        let user = self.require_user(user_id).await?;
        let pin = self.require_pin(pin_id, "Error to delete the post.").await?;
        if pin.user_id != user.id {
            return Err(PinsError::forbidden(
                "You are not allowed to delete this post.",
            ));
        }

        self.users.adjust_pins_count(user.id, -1).await?;
        self.sql.pins_delete(pin.id).await?;

        info!(pin_id = %pin.id, user_id = %user.id, "Deleted pin");
        Ok(pin.into())
    }

    pub async fn pins_by_user(
        &self,
        user_id: Uuid,
        page: PageQuery,
        viewer: Option<Uuid>,
    ) -> PinsResult<Vec<PinListItem>> {
        let user = self.require_user(user_id).await?;
        let rows = self.sql.pins_list_for_user(user.id, page.window()).await?;
        self.list_items(rows, viewer).await
    }

    pub async fn liked_pins(
        &self,
        user_id: Uuid,
        page: PageQuery,
        viewer: Option<Uuid>,
    ) -> PinsResult<Vec<PinListItem>> {
        let user = self.require_user(user_id).await?;
        let rows = self.sql.pins_list_liked_by(user.id, page.window()).await?;
        self.list_items(rows, viewer).await
    }

    pub async fn user_pins_count(&self, user_id: Uuid) -> PinsResult<i32> {
        Ok(self.require_user(user_id).await?.pins_count)
    }

    // Likes

    pub async fn toggle_like(&self, pin_id: Uuid, user_id: Uuid) -> PinsResult<LikeState> {
        let pin = self.require_pin(pin_id, PIN_NOT_FOUND).await?;
        let user = self.require_user(user_id).await?;

        if let Some(existing) = self.sql.likes_find(pin.id, user.id).await? {
            info!(pin_id = %pin.id, user_id = %user.id, "Removing like");
            // An overlapping unlike may already have removed the row
            if self.sql.likes_delete(existing.id).await? {
                self.sql
                    .pins_adjust_counter(pin.id, PinCounter::Likes, -1)
                    .await?;
            }
            return Ok(LikeState {
                liked: false,
                likes_count: (pin.likes_count - 1).max(0),
            });
        }

        info!(pin_id = %pin.id, user_id = %user.id, "Adding like");
        match self.sql.likes_insert(pin.id, user.id).await {
            Ok(_) => {}
            // Lost a race with a concurrent like from the same user
            Err(SqlStorageError::Conflict(_)) => {
                return Ok(LikeState {
                    liked: true,
                    likes_count: pin.likes_count,
                });
            }
            Err(err) => return Err(err.into()),
        }

        // Counter first: dispatch may be cut short by its timeout or by the client
        self.sql
            .pins_adjust_counter(pin.id, PinCounter::Likes, 1)
            .await?;

        if pin.user_id != user.id
            && let Some(owner) = self.users.get_user_by_id(pin.user_id).await?
        {
            dispatch(
                self.notifier,
                ActivityEvent::like(owner.email, pin.description.clone()),
            )
            .await;
        }

        Ok(LikeState {
            liked: true,
            likes_count: pin.likes_count + 1,
        })
    }

    pub async fn like_status(&self, pin_id: Uuid, user_id: Uuid) -> PinsResult<LikeState> {
        let user = self.require_user(user_id).await?;
        let pin = self.require_pin(pin_id, PIN_NOT_FOUND).await?;
        let liked = self.sql.likes_find(pin.id, user.id).await?.is_some();

        debug!(pin_id = %pin.id, user_id = %user.id, liked, likes_count = pin.likes_count, "Like status");
        Ok(LikeState {
            liked,
            likes_count: pin.likes_count,
        })
    }

    // Comments

    /// Comments on a pin, oldest first. Unknown pins have no comments.
    pub async fn list_comments(&self, pin_id: Uuid) -> PinsResult<Vec<CommentView>> {
        if self.sql.pins_get(pin_id).await?.is_none() {
            return Ok(Vec::new());
        }
        let rows = self.sql.comments_list_for_pin(pin_id).await?;
        self.comment_views(rows).await
    }

    pub async fn create_comment(
        &self,
        user_id: Uuid,
        pin_id: Uuid,
        text: &str,
    ) -> PinsResult<CreatedComment> {
        if text.trim().is_empty() {
            return Err(PinsError::bad_request("text must not be empty"));
        }

        let pin = self.require_pin(pin_id, POST_NOT_FOUND).await?;
        let user = self.require_user(user_id).await?;

        let row = self.sql.comments_insert(pin.id, user.id, text).await?;
        self.sql
            .pins_adjust_counter(pin.id, PinCounter::Comments, 1)
            .await?;

        if let Some(owner) = self.users.get_user_by_id(pin.user_id).await? {
            dispatch(
                self.notifier,
                ActivityEvent::comment(owner.email, pin.description.clone(), text),
            )
            .await;
        }

        info!(pin_id = %pin.id, user_id = %user.id, comment_id = %row.id, "Created comment");

        let authors = HashMap::from([(user.id, user)]);
        Ok(CreatedComment {
            comment: CommentView::new(row, &authors),
            pin: PinRef { id: pin.id },
        })
    }

    async fn require_own_comment(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        forbidden: &str,
    ) -> PinsResult<CommentRow> {
        let user = self.require_user(user_id).await?;
        let comment = self
            .sql
            .comments_get(comment_id)
            .await?
            .ok_or_else(|| PinsError::not_found("Comment not found."))?;
        if comment.user_id != user.id {
            return Err(PinsError::forbidden(forbidden));
        }
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        text: &str,
        user_id: Uuid,
    ) -> PinsResult<CommentRow> {
        if text.trim().is_empty() {
            return Err(PinsError::bad_request("text must not be empty"));
        }

        let comment = self
            .require_own_comment(
                comment_id,
                user_id,
                "You are not allowed to modify this comment.",
            )
            .await?;

        self.sql
            .comments_update_text(comment.id, text)
            .await?
            .ok_or_else(|| PinsError::not_found("Comment not found."))
    }

    pub async fn delete_comment(&self, comment_id: Uuid, user_id: Uuid) -> PinsResult<CommentRow> {
        let comment = self
            .require_own_comment(
                comment_id,
                user_id,
                "You are not allowed to delete this comment.",
            )
            .await?;

        if !self.sql.comments_delete(comment.id).await? {
            return Err(PinsError::not_found("Comment not found."));
        }
        self.sql
            .pins_adjust_counter(comment.pin_id, PinCounter::Comments, -1)
            .await?;

        info!(comment_id = %comment.id, user_id = %user_id, "Deleted comment");
        Ok(comment)
    }

    // Views

    pub async fn record_view(&self, user_id: Uuid, pin_id: Uuid) -> PinsResult<ViewRow> {
        let pin = self.require_pin(pin_id, POST_NOT_FOUND).await?;
        let user = self.require_user(user_id).await?;

        self.sql
            .pins_adjust_counter(pin.id, PinCounter::Views, 1)
            .await?;
        Ok(self.sql.views_insert(pin.id, user.id).await?)
    }

    // Saves

    pub async fn list_saved(&self, user_id: Uuid) -> PinsResult<Vec<PinView>> {
        let user = self.require_user(user_id).await?;
        let rows = self.sql.saves_list_pins_for_user(user.id).await?;
        Ok(rows.into_iter().map(PinView::from).collect())
    }

    pub async fn save_pin(&self, pin_id: Uuid, user_id: Uuid) -> PinsResult<SaveRow> {
        let pin = self.require_pin(pin_id, POST_NOT_FOUND).await?;
        let user = self.require_user(user_id).await?;

        if self.sql.saves_find(pin.id, user.id).await?.is_some() {
            return Err(PinsError::bad_request(ALREADY_SAVED));
        }

        match self.sql.saves_insert(pin.id, user.id).await {
            Ok(save) => Ok(save),
            Err(SqlStorageError::Conflict(_)) => Err(PinsError::bad_request(ALREADY_SAVED)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete_save(&self, save_id: Uuid, user_id: Uuid) -> PinsResult<()> {
        let user = self.require_user(user_id).await?;
        let save = self
            .sql
            .saves_get(save_id)
            .await?
            .ok_or_else(|| PinsError::not_found("Item not found."))?;
        if save.user_id != user.id {
            return Err(PinsError::forbidden(
                "You are not allowed to delete this item.",
            ));
        }

        self.sql.saves_delete(save.id).await?;
        Ok(())
    }

    // Categories

    pub async fn list_categories(&self) -> PinsResult<Vec<CategoryRow>> {
        Ok(self.sql.categories_list().await?)
    }

    pub async fn create_category(&self, name: &str) -> PinsResult<CategoryRow> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PinsError::bad_request("Category name must not be empty"));
        }

        match self.sql.categories_create(name).await {
            Ok(category) => {
                info!(category_id = %category.id, name, "Created category");
                Ok(category)
            }
            Err(SqlStorageError::Conflict(_)) => {
                Err(PinsError::bad_request("Category already exists."))
            }
            Err(err) => Err(err.into()),
        }
    }

    // Users

    pub async fn me(&self, user_id: Uuid) -> PinsResult<UserProfile> {
        Ok(self.require_user(user_id).await?.into())
    }
}
