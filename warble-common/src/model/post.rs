use crate::model::{
    Id,
    user::{UserMarker, UserSummary},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_TEXT_MAX_LEN: usize = 512;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostChangeMarker;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Post text is longer than {POST_TEXT_MAX_LEN} characters")]
pub struct PostTextTooLongError;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    #[serde(alias = "newest")]
    New,
    #[serde(alias = "oldest")]
    Old,
    Popular,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMedia {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub url_modifiers: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mime: String,
    pub subtype: String,
    pub width: i32,
    pub height: i32,
}

/// A media row including its bookkeeping, as shown in a post's history.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaHistoryEntry {
    #[serde(flatten)]
    pub media: PostMedia,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub is_deleted: bool,
    pub post_id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePost {
    #[serde(default)]
    pub text: String,
    pub original_id: Option<Id<PostMarker>>,
    pub comment_to_id: Option<Id<PostMarker>>,
    pub response_to_id: Option<Id<PostMarker>>,
    #[serde(default = "can_comment_default")]
    pub can_comment: bool,
    #[serde(default)]
    pub media: Vec<PostMedia>,
}

fn can_comment_default() -> bool {
    true
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    pub text: Option<String>,
    /// The complete new media list. Media missing from it is soft-deleted.
    pub media: Option<Vec<PostMedia>>,
    pub can_comment: Option<bool>,
}

impl UpdatePost {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.media.is_none() && self.can_comment.is_none()
    }
}

pub fn check_post_text(text: &str) -> Result<(), PostTextTooLongError> {
    if text.chars().count() > POST_TEXT_MAX_LEN {
        Err(PostTextTooLongError)
    } else {
        Ok(())
    }
}

/// Aggregated interaction numbers of a post, relative to the caller.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStats {
    pub likes: i64,
    pub dislikes: i64,
    /// +1 if the caller liked the post, -1 if they disliked it, 0 otherwise.
    pub reaction: i64,
    pub comments: i64,
    #[serde(rename = "responseCount")]
    pub responses: i64,
    pub reposts: i64,
    pub is_favorite: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: String,
    pub user: UserSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
    pub can_comment: bool,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<Id<PostMarker>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_to_id: Option<Id<PostMarker>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_to_id: Option<Id<PostMarker>>,
    #[serde(flatten)]
    pub stats: PostStats,
    pub media: Vec<PostMedia>,
}

/// A soft-deleted post kept so that replies to it stay addressable.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub id: Id<PostMarker>,
    pub is_deleted: bool,
}

impl Tombstone {
    #[must_use]
    pub fn new(id: Id<PostMarker>) -> Self {
        Self {
            id,
            is_deleted: true,
        }
    }
}

/// One entry of any post listing: posts, comments and responses alike.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(untagged)]
pub enum FeedPost {
    Post(Box<Post>),
    Tombstone(Tombstone),
}

impl FeedPost {
    #[must_use]
    pub fn id(&self) -> Id<PostMarker> {
        match self {
            FeedPost::Post(post) => post.id,
            FeedPost::Tombstone(tombstone) => tombstone.id,
        }
    }

    #[must_use]
    pub fn as_post(&self) -> Option<&Post> {
        match self {
            FeedPost::Post(post) => Some(post),
            FeedPost::Tombstone(_) => None,
        }
    }
}

/// Lightweight view of a post row, for ownership and parent checks.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostRef {
    pub id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub comment_to_id: Option<Id<PostMarker>>,
    pub can_comment: bool,
    pub is_deleted: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostChange {
    pub id: Id<PostChangeMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub text: String,
    pub is_deleted: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostHistory {
    pub changes: Vec<PostChange>,
    pub media: Vec<MediaHistoryEntry>,
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        post::{CreatePost, FeedPost, SortMode, Tombstone, check_post_text},
    };
    use serde_json::json;

    #[test]
    fn tombstone_serializes_to_id_and_flag() {
        let id = Id::nil();
        let json = serde_json::to_value(FeedPost::Tombstone(Tombstone::new(id))).unwrap();
        assert_eq!(
            json,
            json!({ "id": "00000000-0000-0000-0000-000000000000", "isDeleted": true })
        );
    }

    #[test]
    fn create_post_defaults() {
        let post: CreatePost = serde_json::from_value(json!({ "text": "hi" })).unwrap();
        assert!(post.can_comment);
        assert!(post.media.is_empty());
        assert_eq!(post.comment_to_id, None);
    }

    #[test]
    fn sort_mode_names() {
        assert_eq!(
            serde_json::from_value::<SortMode>(json!("new")).unwrap(),
            SortMode::New
        );
        assert_eq!(
            serde_json::from_value::<SortMode>(json!("oldest")).unwrap(),
            SortMode::Old
        );
        assert_eq!(
            serde_json::from_value::<SortMode>(json!("popular")).unwrap(),
            SortMode::Popular
        );
        assert!(serde_json::from_value::<SortMode>(json!("random")).is_err());
    }

    #[test]
    fn text_length_limit() {
        assert!(check_post_text(&"a".repeat(512)).is_ok());
        assert!(check_post_text(&"a".repeat(513)).is_err());
    }
}
