use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::{convert::Infallible, sync::Arc};
use tracing::warn;
use warble_common::model::{
    Id,
    auth::{TokenKind, TokenService},
    user::UserMarker,
};

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// A caller with a valid access token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            AuthorizationHeader::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?;

        let id = Arc::<TokenService>::from_ref(state).verify(TokenKind::Access, bearer.token())?;

        Ok(Self { id })
    }
}

/// The caller if they sent a usable access token, anonymous otherwise.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct MaybeUser {
    id: Option<Id<UserMarker>>,
}

impl MaybeUser {
    #[must_use]
    pub fn user_id(self) -> Option<Id<UserMarker>> {
        self.id
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthenticatedUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self {
                id: Some(user.user_id()),
            }),
            Err(ServerError::InvalidAuthorizationHeader(rejection)) if rejection.is_missing() => {
                Ok(Self::default())
            }
            Err(err) => {
                warn!(error = %err, "Ignoring unusable access token");
                Ok(Self::default())
            }
        }
    }
}
