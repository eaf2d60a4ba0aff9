use crate::model::{
    Id,
    conversation::ConversationMarker,
    post::PostMarker,
    user::UserSummary,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const MESSAGE_TEXT_MAX_LEN: usize = 2048;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct MessageMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct MessageChangeMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    pub conversation_id: Id<ConversationMarker>,
    pub text: Option<String>,
    /// Forwarded message.
    pub original_id: Option<Id<MessageMarker>>,
    pub response_to_id: Option<Id<MessageMarker>>,
    /// Shared post.
    pub post_id: Option<Id<PostMarker>>,
}

impl CreateMessage {
    /// A message has to carry something.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|text| !text.trim().is_empty())
            || self.original_id.is_some()
            || self.post_id.is_some()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct EditMessage {
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Id<MessageMarker>,
    pub conversation_id: Id<ConversationMarker>,
    pub user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<Id<MessageMarker>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_to_id: Option<Id<MessageMarker>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<Id<PostMarker>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
    pub is_deleted: bool,
}

/// Preview of the latest message in a conversation list.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageShort {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_repost: bool,
    pub is_post: bool,
    pub user: UserSummary,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageChange {
    pub id: Id<MessageChangeMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, message::CreateMessage};

    #[test]
    fn message_needs_content() {
        let mut message = CreateMessage {
            conversation_id: Id::nil(),
            text: Some("   ".to_owned()),
            original_id: None,
            response_to_id: None,
            post_id: None,
        };
        assert!(!message.has_content());

        message.post_id = Some(Id::nil());
        assert!(message.has_content());

        message.post_id = None;
        message.text = Some("hey".to_owned());
        assert!(message.has_content());
    }
}
