pub mod auth;
pub mod conversation;
pub mod message;
pub mod post;
pub mod reaction;
pub mod tag;
pub mod user;

use crate::model::{
    conversation::InvalidConversationTypeError, post::PostTextTooLongError,
    user::InvalidUsernameError,
};
use derive_where::derive_where;
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
    str::FromStr,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    PostText(#[from] PostTextTooLongError),
    #[error(transparent)]
    ConversationType(#[from] InvalidConversationTypeError),
}

/// A database id tagged with the kind of row it points at.
#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Id<Marker>(Uuid, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid, PhantomData)
    }

    #[must_use]
    pub fn random() -> Self {
        Self::new(Uuid::new_v4())
    }

    /// The all-zero id. No row ever has it.
    #[must_use]
    pub fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    #[must_use]
    pub fn get(self) -> Uuid {
        self.0
    }

    #[must_use]
    pub fn cast<Other>(self) -> Id<Other> {
        Id::new(self.0)
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self::new)
    }
}

impl<Marker> From<Uuid> for Id<Marker> {
    fn from(value: Uuid) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for Uuid {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, user::UserMarker};
    use uuid::Uuid;

    #[test]
    fn id_serializes_as_bare_uuid() {
        let uuid = Uuid::parse_str("6f1c2a7e-96c3-4b52-9d3e-0d0f3f6c1a11").unwrap();
        let id = Id::<UserMarker>::new(uuid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"6f1c2a7e-96c3-4b52-9d3e-0d0f3f6c1a11\"");

        let parsed: Id<UserMarker> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(id.to_string().parse::<Id<UserMarker>>().unwrap(), id);
    }

    #[test]
    fn nil_id_is_zero_uuid() {
        assert_eq!(
            Id::<UserMarker>::nil().to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
        assert!("not-a-uuid".parse::<Id<UserMarker>>().is_err());
    }
}
