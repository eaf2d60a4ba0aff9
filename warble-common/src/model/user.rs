use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const USERNAME_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0}")]
pub struct InvalidUsernameError(String);

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        let len = username.chars().count();
        if len > 0 && len <= USERNAME_MAX_LEN && !username.chars().any(char::is_whitespace) {
            Ok(Username(username))
        } else {
            Err(InvalidUsernameError(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Avatar {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Avatar {
    /// Avatars are stored as two nullable columns that are set together.
    #[must_use]
    pub fn from_columns(url: Option<String>, kind: Option<String>) -> Option<Self> {
        Some(Self {
            url: url?,
            kind: kind.unwrap_or_default(),
        })
    }
}

/// Author or participant identity as shown next to content.
///
/// Deleted users are redacted down to the flag.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id<UserMarker>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<Username>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Avatar>,
    pub is_deleted: bool,
}

impl UserSummary {
    #[must_use]
    pub fn redacted() -> Self {
        Self {
            is_deleted: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseUser {
    pub id: Id<UserMarker>,
    pub name: String,
    pub username: Option<Username>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Avatar>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(flatten)]
    pub user: BaseUser,
    pub followers: i64,
    pub following: i64,
    pub is_subscribed: bool,
    pub post_count: i64,
    pub bio: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowInfo {
    #[serde(flatten)]
    pub user: BaseUser,
    pub is_subscribed: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: Username,
    pub password: String,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

/// What is needed to check a login attempt.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserCredentials {
    pub id: Id<UserMarker>,
    pub password_hash: String,
    pub is_deleted: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeUser {
    pub name: Option<String>,
    pub username: Option<Username>,
    /// An avatar with an empty url removes the current one.
    pub avatar: Option<Avatar>,
    pub bio: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

impl ChangeUser {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.username.is_none()
            && self.avatar.is_none()
            && self.bio.is_none()
            && self.password.is_none()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{Avatar, UserSummary, Username};

    #[test]
    fn username_validation() {
        assert!(Username::new("alice".to_owned()).is_ok());
        assert!(Username::new(String::new()).is_err());
        assert!(Username::new("has space".to_owned()).is_err());
        assert!(Username::new("x".repeat(51)).is_err());
        assert!(serde_json::from_str::<Username>("\"\"").is_err());
    }

    #[test]
    fn redacted_summary_only_has_flag() {
        let json = serde_json::to_value(UserSummary::redacted()).unwrap();
        assert_eq!(json, serde_json::json!({ "isDeleted": true }));
    }

    #[test]
    fn avatar_needs_url() {
        assert_eq!(Avatar::from_columns(None, Some("image".to_owned())), None);
        assert_eq!(
            Avatar::from_columns(Some("u".to_owned()), Some("image".to_owned())),
            Some(Avatar {
                url: "u".to_owned(),
                kind: "image".to_owned()
            })
        );
    }
}
