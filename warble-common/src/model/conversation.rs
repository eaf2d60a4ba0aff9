use crate::{
    error::DomainError,
    model::{
        Id,
        message::MessageShort,
        user::{UserMarker, UserSummary},
    },
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ConversationMarker;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Private,
    Group,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("Unknown conversation type: {0}")]
pub struct InvalidConversationTypeError(String);

impl ConversationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationType::Private => "private",
            ConversationType::Group => "group",
        }
    }
}

impl Display for ConversationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationType {
    type Err = InvalidConversationTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(ConversationType::Private),
            "group" => Ok(ConversationType::Group),
            other => Err(InvalidConversationTypeError(other.to_owned())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversation {
    #[serde(rename = "type")]
    pub kind: ConversationType,
    #[serde(default)]
    pub name: String,
    pub add_user_id: Option<Id<UserMarker>>,
    #[serde(default)]
    pub can_add_users: bool,
    #[serde(default)]
    pub has_invite_link: bool,
}

/// A conversation that passed validation and can be inserted.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum NewConversation {
    Private {
        creator: Id<UserMarker>,
        other: Id<UserMarker>,
    },
    Group {
        creator: Id<UserMarker>,
        name: String,
        can_add_users: bool,
        has_invite_link: bool,
    },
}

impl CreateConversation {
    pub fn validate(self, creator: Id<UserMarker>) -> Result<NewConversation, DomainError> {
        match self.kind {
            ConversationType::Private => {
                let other = self.add_user_id.ok_or(DomainError::WrongData)?;
                if other == creator {
                    return Err(DomainError::AlreadyExists);
                }
                Ok(NewConversation::Private { creator, other })
            }
            ConversationType::Group => {
                let name = self.name.trim();
                if name.is_empty() {
                    return Err(DomainError::EmptyString);
                }
                Ok(NewConversation::Group {
                    creator,
                    name: name.to_owned(),
                    can_add_users: self.can_add_users,
                    has_invite_link: self.has_invite_link,
                })
            }
        }
    }
}

/// The parts of a conversation row that membership rules depend on.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ConversationPolicy {
    pub kind: ConversationType,
    pub creator: Id<UserMarker>,
    pub can_add_users: bool,
}

/// Who may add users to a group.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum AddPermission {
    Allowed,
    /// Allowed if the requester is an active participant.
    IfParticipant,
}

impl ConversationPolicy {
    pub fn check_add(self, requester: Id<UserMarker>) -> Result<AddPermission, DomainError> {
        if self.kind == ConversationType::Private {
            return Err(DomainError::PrivateConversation);
        }
        if requester == self.creator {
            Ok(AddPermission::Allowed)
        } else if self.can_add_users {
            Ok(AddPermission::IfParticipant)
        } else {
            Err(DomainError::CannotAddUser)
        }
    }

    pub fn check_kick(
        self,
        requester: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> Result<(), DomainError> {
        if requester == target
            || self.kind == ConversationType::Private
            || requester != self.creator
        {
            return Err(DomainError::CannotKick);
        }
        Ok(())
    }

    pub fn check_leave(self) -> Result<(), DomainError> {
        match self.kind {
            ConversationType::Private => Err(DomainError::PrivateConversation),
            ConversationType::Group => Ok(()),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct AddUsers {
    pub users: Vec<Id<UserMarker>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickUser {
    pub user_id: Id<UserMarker>,
}

/// An entry of the caller's conversation list.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Id<ConversationMarker>,
    #[serde(rename = "type")]
    pub kind: ConversationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The other participant of a private conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    pub unread_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessageShort>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInfo {
    pub id: Id<ConversationMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub can_add_users: bool,
    pub has_invite_link: bool,
    pub users: Vec<UserSummary>,
}

#[cfg(test)]
mod tests {
    use crate::{
        error::DomainError,
        model::{
            Id,
            conversation::{
                AddPermission, ConversationPolicy, ConversationType, CreateConversation,
                NewConversation,
            },
            user::UserMarker,
        },
    };
    use uuid::Uuid;

    fn user(n: u128) -> Id<UserMarker> {
        Id::new(Uuid::from_u128(n))
    }

    fn create(kind: ConversationType, name: &str, add: Option<Id<UserMarker>>) -> CreateConversation {
        CreateConversation {
            kind,
            name: name.to_owned(),
            add_user_id: add,
            can_add_users: false,
            has_invite_link: false,
        }
    }

    #[test]
    fn private_with_self_already_exists() {
        let result = create(ConversationType::Private, "", Some(user(1))).validate(user(1));
        assert_eq!(result, Err(DomainError::AlreadyExists));
    }

    #[test]
    fn private_drops_name() {
        let result = create(ConversationType::Private, "ignored", Some(user(2))).validate(user(1));
        assert_eq!(
            result,
            Ok(NewConversation::Private {
                creator: user(1),
                other: user(2)
            })
        );
        assert_eq!(
            create(ConversationType::Private, "", None).validate(user(1)),
            Err(DomainError::WrongData)
        );
    }

    #[test]
    fn group_needs_name() {
        assert_eq!(
            create(ConversationType::Group, "   ", None).validate(user(1)),
            Err(DomainError::EmptyString)
        );
        let Ok(NewConversation::Group { name, .. }) =
            create(ConversationType::Group, "  book club ", None).validate(user(1))
        else {
            panic!("expected a group");
        };
        assert_eq!(name, "book club");
    }

    #[test]
    fn membership_rules() {
        let group = ConversationPolicy {
            kind: ConversationType::Group,
            creator: user(1),
            can_add_users: false,
        };
        let open_group = ConversationPolicy {
            can_add_users: true,
            ..group
        };
        let private = ConversationPolicy {
            kind: ConversationType::Private,
            ..group
        };

        assert_eq!(group.check_add(user(1)), Ok(AddPermission::Allowed));
        assert_eq!(group.check_add(user(2)), Err(DomainError::CannotAddUser));
        assert_eq!(open_group.check_add(user(2)), Ok(AddPermission::IfParticipant));
        assert_eq!(
            private.check_add(user(1)),
            Err(DomainError::PrivateConversation)
        );

        assert_eq!(group.check_kick(user(1), user(2)), Ok(()));
        assert_eq!(group.check_kick(user(1), user(1)), Err(DomainError::CannotKick));
        assert_eq!(group.check_kick(user(2), user(3)), Err(DomainError::CannotKick));
        assert_eq!(private.check_kick(user(1), user(2)), Err(DomainError::CannotKick));

        assert_eq!(group.check_leave(), Ok(()));
        assert_eq!(private.check_leave(), Err(DomainError::PrivateConversation));
    }

    #[test]
    fn type_round_trips_through_column_text() {
        for kind in [ConversationType::Private, ConversationType::Group] {
            assert_eq!(kind.as_str().parse::<ConversationType>().unwrap(), kind);
        }
        assert!("channel".parse::<ConversationType>().is_err());
    }
}
