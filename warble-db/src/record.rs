use serde::Deserialize;
use sqlx::{FromRow, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;
use warble_common::model::{
    ModelValidationError,
    conversation::{Conversation, ConversationInfo, ConversationPolicy, ConversationType},
    message::{Message, MessageChange, MessageShort},
    post::{FeedPost, MediaHistoryEntry, Post, PostChange, PostMedia, PostRef, PostStats, Tombstone},
    tag::Tag,
    user::{Avatar, BaseUser, FollowInfo, UserCredentials, UserInfo, UserSummary, Username},
};

/// One row of a feed query, see [`crate::feed`].
#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct FeedRecord {
    pub id: Uuid,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub can_comment: bool,
    pub is_deleted: bool,
    pub author_id: Uuid,
    pub author_username: Option<String>,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub author_avatar_type: Option<String>,
    pub author_deleted: bool,
    pub original_id: Option<Uuid>,
    pub comment_to_id: Option<Uuid>,
    pub response_to_id: Option<Uuid>,
    pub likes: i64,
    pub dislikes: i64,
    pub reaction: i64,
    pub comments: i64,
    pub responses: i64,
    pub reposts: i64,
    pub is_favorite: bool,
    pub media: Option<Json<Vec<MediaRecord>>>,
}

/// An element of the aggregated media array. Every field may be null.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MediaRecord {
    pub id: Option<String>,
    pub url: Option<String>,
    pub url_modifiers: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub mime: Option<String>,
    pub subtype: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl From<MediaRecord> for PostMedia {
    fn from(value: MediaRecord) -> Self {
        Self {
            id: value.id.unwrap_or_default(),
            url: value.url.unwrap_or_default(),
            url_modifiers: value.url_modifiers.unwrap_or_default(),
            kind: value.kind.unwrap_or_default(),
            mime: value.mime.unwrap_or_default(),
            subtype: value.subtype.unwrap_or_default(),
            width: value.width.unwrap_or_default(),
            height: value.height.unwrap_or_default(),
        }
    }
}

fn decode_media(media: Option<Json<Vec<MediaRecord>>>) -> Vec<PostMedia> {
    let Some(Json(media)) = media else {
        return Vec::new();
    };

    // An outer join over no media aggregates to a single all-null element.
    if media.first().is_some_and(|first| first.id.is_none()) {
        return Vec::new();
    }

    media.into_iter().map(PostMedia::from).collect()
}

fn optional_username(username: Option<String>) -> Result<Option<Username>, ModelValidationError> {
    Ok(username.map(Username::new).transpose()?)
}

impl TryFrom<FeedRecord> for FeedPost {
    type Error = ModelValidationError;

    fn try_from(value: FeedRecord) -> Result<Self, Self::Error> {
        if value.is_deleted {
            return Ok(FeedPost::Tombstone(Tombstone::new(value.id.into())));
        }

        let user = if value.author_deleted {
            UserSummary::redacted()
        } else {
            UserSummary {
                id: Some(value.author_id.into()),
                username: optional_username(value.author_username)?,
                name: Some(value.author_name),
                avatar: Avatar::from_columns(value.author_avatar_url, value.author_avatar_type),
                is_deleted: false,
            }
        };

        let updated_at = (value.updated_at != value.created_at).then_some(value.updated_at);

        Ok(FeedPost::Post(Box::new(Post {
            id: value.id.into(),
            text: value.text,
            user,
            created_at: value.created_at,
            updated_at,
            can_comment: value.can_comment,
            is_deleted: false,
            original_id: value.original_id.map(Into::into),
            comment_to_id: value.comment_to_id.map(Into::into),
            response_to_id: value.response_to_id.map(Into::into),
            stats: PostStats {
                likes: value.likes,
                dislikes: value.dislikes,
                reaction: value.reaction,
                comments: value.comments,
                responses: value.responses,
                reposts: value.reposts,
                is_favorite: value.is_favorite,
            },
            media: decode_media(value.media),
        })))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct PostRefRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub comment_to_id: Option<Uuid>,
    pub can_comment: bool,
    pub is_deleted: bool,
}

impl From<PostRefRecord> for PostRef {
    fn from(value: PostRefRecord) -> Self {
        Self {
            id: value.id.into(),
            author: value.user_id.into(),
            comment_to_id: value.comment_to_id.map(Into::into),
            can_comment: value.can_comment,
            is_deleted: value.is_deleted,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct PostChangeRecord {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub text: String,
    pub is_deleted: bool,
}

impl From<PostChangeRecord> for PostChange {
    fn from(value: PostChangeRecord) -> Self {
        Self {
            id: value.id.into(),
            created_at: value.created_at,
            text: value.text,
            is_deleted: value.is_deleted,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct MediaRowRecord {
    pub id: String,
    pub post_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub url: String,
    pub url_modifiers: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub mime: String,
    pub subtype: String,
    pub width: i32,
    pub height: i32,
    pub is_deleted: bool,
}

impl From<MediaRowRecord> for MediaHistoryEntry {
    fn from(value: MediaRowRecord) -> Self {
        Self {
            media: PostMedia {
                id: value.id,
                url: value.url,
                url_modifiers: value.url_modifiers,
                kind: value.kind,
                mime: value.mime,
                subtype: value.subtype,
                width: value.width,
                height: value.height,
            },
            created_at: value.created_at,
            updated_at: value.updated_at,
            is_deleted: value.is_deleted,
            post_id: value.post_id.into(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct CredentialsRecord {
    pub id: Uuid,
    pub password: String,
    pub is_deleted: bool,
}

impl From<CredentialsRecord> for UserCredentials {
    fn from(value: CredentialsRecord) -> Self {
        Self {
            id: value.id.into(),
            password_hash: value.password,
            is_deleted: value.is_deleted,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct BaseUserRecord {
    pub id: Uuid,
    pub name: String,
    pub username: Option<String>,
    pub created_at: OffsetDateTime,
    pub is_private: bool,
    pub avatar_url: Option<String>,
    pub avatar_type: Option<String>,
}

impl TryFrom<BaseUserRecord> for BaseUser {
    type Error = ModelValidationError;

    fn try_from(value: BaseUserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            name: value.name,
            username: optional_username(value.username)?,
            created_at: value.created_at,
            is_private: value.is_private,
            avatar: Avatar::from_columns(value.avatar_url, value.avatar_type),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct UserInfoRecord {
    #[sqlx(flatten)]
    pub user: BaseUserRecord,
    pub bio: Option<String>,
    pub is_deleted: bool,
    pub followers: i64,
    pub following: i64,
    pub post_count: i64,
    pub is_subscribed: bool,
}

impl TryFrom<UserInfoRecord> for UserInfo {
    type Error = ModelValidationError;

    fn try_from(value: UserInfoRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user.try_into()?,
            followers: value.followers,
            following: value.following,
            is_subscribed: value.is_subscribed,
            post_count: value.post_count,
            bio: value.bio,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct FollowInfoRecord {
    #[sqlx(flatten)]
    pub user: BaseUserRecord,
    pub is_subscribed: bool,
}

impl TryFrom<FollowInfoRecord> for FollowInfo {
    type Error = ModelValidationError;

    fn try_from(value: FollowInfoRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user.try_into()?,
            is_subscribed: value.is_subscribed,
        })
    }
}

/// User columns as joined next to content, all nullable because of outer joins.
#[derive(Clone, Eq, PartialEq, Debug, Default, FromRow)]
pub(crate) struct SummaryRecord {
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_type: Option<String>,
    pub user_deleted: Option<bool>,
}

impl SummaryRecord {
    /// `None` when the outer join found no user at all.
    pub fn into_summary(self) -> Result<Option<UserSummary>, ModelValidationError> {
        let Some(id) = self.user_id else {
            return Ok(None);
        };

        if self.user_deleted.unwrap_or_default() {
            return Ok(Some(UserSummary::redacted()));
        }

        Ok(Some(UserSummary {
            id: Some(id.into()),
            username: optional_username(self.username)?,
            name: self.name,
            avatar: Avatar::from_columns(self.avatar_url, self.avatar_type),
            is_deleted: false,
        }))
    }
}

fn summary(record: SummaryRecord) -> Result<UserSummary, ModelValidationError> {
    Ok(record.into_summary()?.unwrap_or_else(UserSummary::redacted))
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct TagRecord {
    pub name: String,
    pub post_count: i64,
    pub created_at: OffsetDateTime,
}

impl From<TagRecord> for Tag {
    fn from(value: TagRecord) -> Self {
        Self {
            name: value.name,
            post_count: value.post_count,
            created_at: value.created_at,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct PolicyRecord {
    #[sqlx(rename = "type")]
    pub kind: String,
    pub creator_id: Uuid,
    pub can_add_users: bool,
}

impl TryFrom<PolicyRecord> for ConversationPolicy {
    type Error = ModelValidationError;

    fn try_from(value: PolicyRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: value.kind.parse()?,
            creator: value.creator_id.into(),
            can_add_users: value.can_add_users,
        })
    }
}

/// Membership of one user in one conversation.
#[derive(Copy, Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct ParticipantRecord {
    pub has_left: bool,
    pub is_kicked: bool,
}

impl ParticipantRecord {
    pub fn is_active(self) -> bool {
        !self.has_left && !self.is_kicked
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct JoinTargetRecord {
    #[sqlx(rename = "type")]
    pub kind: String,
    pub has_invite_link: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct MessageOwnerRecord {
    pub user_id: Uuid,
    pub conversation_id: Uuid,
    pub text: Option<String>,
    pub is_deleted: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct ConversationRecord {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    pub kind: String,
    #[sqlx(rename = "conversation_name")]
    pub name: Option<String>,
    pub unread_count: i64,
    #[sqlx(flatten)]
    pub other: SummaryRecord,
    pub last_text: Option<String>,
    pub last_created_at: Option<OffsetDateTime>,
    pub last_is_repost: Option<bool>,
    pub last_is_post: Option<bool>,
    pub last_user_id: Option<Uuid>,
    pub last_username: Option<String>,
    pub last_name: Option<String>,
    pub last_avatar_url: Option<String>,
    pub last_avatar_type: Option<String>,
    pub last_user_deleted: Option<bool>,
}

impl TryFrom<ConversationRecord> for Conversation {
    type Error = ModelValidationError;

    fn try_from(value: ConversationRecord) -> Result<Self, Self::Error> {
        let kind: ConversationType = value.kind.parse()?;

        let user = match kind {
            ConversationType::Private => value.other.into_summary()?,
            ConversationType::Group => None,
        };

        let last_message = match value.last_created_at {
            Some(created_at) => Some(MessageShort {
                text: value.last_text,
                created_at,
                is_repost: value.last_is_repost.unwrap_or_default(),
                is_post: value.last_is_post.unwrap_or_default(),
                user: summary(SummaryRecord {
                    user_id: value.last_user_id,
                    username: value.last_username,
                    name: value.last_name,
                    avatar_url: value.last_avatar_url,
                    avatar_type: value.last_avatar_type,
                    user_deleted: value.last_user_deleted,
                })?,
            }),
            None => None,
        };

        Ok(Self {
            id: value.id.into(),
            kind,
            name: value.name,
            user,
            unread_count: value.unread_count,
            last_message,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct ConversationInfoRecord {
    pub id: Uuid,
    pub name: Option<String>,
    pub can_add_users: bool,
    pub has_invite_link: bool,
}

impl ConversationInfoRecord {
    pub fn with_users(
        self,
        users: Vec<SummaryRecord>,
    ) -> Result<ConversationInfo, ModelValidationError> {
        Ok(ConversationInfo {
            id: self.id.into(),
            name: self.name,
            can_add_users: self.can_add_users,
            has_invite_link: self.has_invite_link,
            users: users.into_iter().map(summary).collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub text: Option<String>,
    pub original_id: Option<Uuid>,
    pub response_to_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub is_deleted: bool,
    #[sqlx(flatten)]
    pub user: SummaryRecord,
}

impl TryFrom<MessageRecord> for Message {
    type Error = ModelValidationError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let user = summary(value.user)?;

        // Deleted messages keep their place in the conversation but lose their content.
        if value.is_deleted {
            return Ok(Self {
                id: value.id.into(),
                conversation_id: value.conversation_id.into(),
                user,
                text: None,
                original_id: None,
                response_to_id: None,
                post_id: None,
                created_at: value.created_at,
                updated_at: None,
                is_deleted: true,
            });
        }

        Ok(Self {
            id: value.id.into(),
            conversation_id: value.conversation_id.into(),
            user,
            text: value.text,
            original_id: value.original_id.map(Into::into),
            response_to_id: value.response_to_id.map(Into::into),
            post_id: value.post_id.map(Into::into),
            created_at: value.created_at,
            updated_at: (value.updated_at != value.created_at).then_some(value.updated_at),
            is_deleted: false,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct MessageChangeRecord {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub text: Option<String>,
}

impl From<MessageChangeRecord> for MessageChange {
    fn from(value: MessageChangeRecord) -> Self {
        Self {
            id: value.id.into(),
            created_at: value.created_at,
            text: value.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{FeedRecord, MediaRecord, SummaryRecord};
    use sqlx::types::Json;
    use time::{Duration, macros::datetime};
    use uuid::Uuid;
    use warble_common::model::{Id, post::FeedPost, user::UserSummary};

    fn record() -> FeedRecord {
        let created_at = datetime!(2024-05-01 12:00 UTC);
        FeedRecord {
            id: Uuid::from_u128(1),
            text: "hello #world".to_owned(),
            created_at,
            updated_at: created_at,
            can_comment: true,
            is_deleted: false,
            author_id: Uuid::from_u128(2),
            author_username: Some("alice".to_owned()),
            author_name: "Alice".to_owned(),
            author_avatar_url: None,
            author_avatar_type: None,
            author_deleted: false,
            original_id: None,
            comment_to_id: None,
            response_to_id: None,
            likes: 1,
            dislikes: 0,
            reaction: 1,
            comments: 2,
            responses: 0,
            reposts: 0,
            is_favorite: true,
            media: None,
        }
    }

    fn media(id: Option<&str>) -> MediaRecord {
        MediaRecord {
            id: id.map(str::to_owned),
            url: id.map(|id| format!("https://cdn.example/{id}")),
            ..MediaRecord::default()
        }
    }

    fn decode(record: FeedRecord) -> FeedPost {
        FeedPost::try_from(record).unwrap()
    }

    #[test]
    fn unchanged_post_omits_updated_at() {
        let post = decode(record());
        let post = post.as_post().unwrap();
        assert_eq!(post.updated_at, None);

        let json = serde_json::to_value(post).unwrap();
        assert!(json.get("updatedAt").is_none());
        assert_eq!(json["likes"], 1);
        assert_eq!(json["isFavorite"], true);
    }

    #[test]
    fn edited_post_has_updated_at() {
        let mut edited = record();
        edited.updated_at = edited.created_at + Duration::minutes(5);
        let post = decode(edited.clone());
        assert_eq!(post.as_post().unwrap().updated_at, Some(edited.updated_at));
    }

    #[test]
    fn deleted_post_is_a_tombstone() {
        let mut deleted = record();
        deleted.is_deleted = true;

        let json = serde_json::to_value(decode(deleted)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "00000000-0000-0000-0000-000000000001",
                "isDeleted": true
            })
        );
    }

    #[test]
    fn deleted_author_is_redacted() {
        let mut orphan = record();
        orphan.author_deleted = true;
        let post = decode(orphan);
        assert_eq!(post.as_post().unwrap().user, UserSummary::redacted());
    }

    #[test]
    fn null_media_artifact_is_empty() {
        let mut artifact = record();
        artifact.media = Some(Json(vec![media(None)]));
        assert!(decode(artifact).as_post().unwrap().media.is_empty());

        assert!(decode(record()).as_post().unwrap().media.is_empty());

        let mut with_media = record();
        with_media.media = Some(Json(vec![media(Some("a")), media(Some("b"))]));
        let post = decode(with_media);
        let ids: Vec<_> = post
            .as_post()
            .unwrap()
            .media
            .iter()
            .map(|media| media.id.as_str())
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn invalid_username_is_rejected() {
        let mut invalid = record();
        invalid.author_username = Some("has space".to_owned());
        assert!(FeedPost::try_from(invalid).is_err());
    }

    #[test]
    fn missing_summary_is_none() {
        assert_eq!(SummaryRecord::default().into_summary().unwrap(), None);

        let present = SummaryRecord {
            user_id: Some(Uuid::from_u128(7)),
            name: Some("Bob".to_owned()),
            user_deleted: Some(false),
            ..SummaryRecord::default()
        }
        .into_summary()
        .unwrap();
        assert_eq!(present.unwrap().id, Some(Id::new(Uuid::from_u128(7))));

        let deleted = SummaryRecord {
            user_id: Some(Uuid::from_u128(7)),
            name: Some("Bob".to_owned()),
            user_deleted: Some(true),
            ..SummaryRecord::default()
        }
        .into_summary()
        .unwrap();
        assert_eq!(deleted, Some(UserSummary::redacted()));
    }
}
