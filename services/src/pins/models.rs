//! Request inputs and JSON response shapes of the pins API.
//!
//! Field names follow the wire format clients already consume, which is why
//! several shapes name the same counter differently (`likesCount` in
//! listings, `likes` in the detail view, `like` after creation).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::{CategoryRow, CommentRow, HashtagRow, PinRow};
use crate::users::StoredUser;

/// Input of `create_pin`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPin {
    pub image: String,
    pub description: String,
    pub category_id: Uuid,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Replacement text for an existing hashtag.
#[derive(Debug, Clone, Deserialize)]
pub struct HashtagEdit {
    pub id: Uuid,
    pub tag: String,
}

/// Input of `update_pin`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinChanges {
    pub image: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub hashtags: Option<Vec<HashtagEdit>>,
}

/// A pin as stored, with its hashtags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinView {
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

impl From<PinRow> for PinView {
    fn from(row: PinRow) -> Self {
        PinView {
            id: row.id,
            image: row.image,
            description: row.description,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
            views_count: row.views_count,
            user_id: row.user_id,
            category_id: row.category_id,
            created_at: row.created_at,
            hashtags: row.hashtags,
        }
    }
}

/// One entry of a feed listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinListItem {
    pub id: Uuid,
    pub image: String,
    pub description: String,
    pub likes_count: i32,
    pub comments_count: i32,
    pub views_count: i32,
    pub created_at: DateTime<Utc>,
    /// Whether the viewer has liked this pin. Always false for anonymous viewers.
    pub liked: bool,
    /// Author username.
    pub user: String,
    pub hashtag: Vec<HashtagRow>,
    pub views: i32,
}

impl PinListItem {
    pub fn new(row: PinRow, author: Option<&StoredUser>, liked: bool) -> Self {
        PinListItem {
            id: row.id,
            image: row.image,
            description: row.description,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
            views_count: row.views_count,
            created_at: row.created_at,
            liked,
            user: author.map(|u| u.username.clone()).unwrap_or_default(),
            hashtag: row.hashtags,
            views: row.views_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentAuthor {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl CommentAuthor {
    fn from_user(user: &StoredUser) -> Self {
        CommentAuthor {
            id: user.id,
            name: user.display_name().to_owned(),
            username: user.username.clone(),
            avatar: user.profile_picture.clone(),
        }
    }

    /// Placeholder for an author row that no longer exists.
    fn unknown(id: Uuid) -> Self {
        CommentAuthor {
            id,
            name: "Anonymous".to_owned(),
            username: String::new(),
            avatar: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub user: CommentAuthor,
}

impl CommentView {
    pub fn new(row: CommentRow, authors: &HashMap<Uuid, StoredUser>) -> Self {
        let user = authors
            .get(&row.user_id)
            .map(CommentAuthor::from_user)
            .unwrap_or_else(|| CommentAuthor::unknown(row.user_id));
        CommentView {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinRef {
    pub id: Uuid,
}

/// A freshly created comment, with the pin it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedComment {
    #[serde(flatten)]
    pub comment: CommentView,
    pub pin: PinRef,
}

/// Single-pin view with its comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinDetail {
    pub id: Uuid,
    /// Owner username.
    pub name: String,
    pub user_id: Uuid,
    pub image: String,
    pub description: String,
    pub likes: i32,
    pub comment: i32,
    pub views: i32,
    pub comments: Vec<CommentView>,
    pub hashtag: Vec<HashtagRow>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
}

impl From<CategoryRow> for CategoryRef {
    fn from(row: CategoryRow) -> Self {
        CategoryRef {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    pub id: Uuid,
    /// The author's pin count including the new pin.
    pub post: i32,
}

/// Result of `create_pin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPin {
    pub id: Uuid,
    pub category: CategoryRef,
    pub user: AuthorRef,
    pub image: String,
    pub description: String,
    pub like: i32,
    pub comment: i32,
    pub view: i32,
    pub hashtag: Vec<HashtagRow>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i32,
}

/// Public profile of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub pins_count: i32,
}

impl From<StoredUser> for UserProfile {
    fn from(user: StoredUser) -> Self {
        UserProfile {
            id: user.id,
            username: user.username,
            email: user.email,
            name: user.name,
            avatar: user.profile_picture,
            pins_count: user.pins_count,
        }
    }
}
