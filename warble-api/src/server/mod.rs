use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use warble_common::{
    error::DomainError,
    model::auth::{TokenError, TokenService},
};
use warble_db::client::{DbClient, DbError};

mod auth;
mod json;
mod query;
mod routes;

pub type ServerRouter = Router<ServerState>;

/// How the refresh cookie is issued.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CookieConfig {
    pub secure: bool,
}

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub tokens: Arc<TokenService>,
    pub cookies: CookieConfig,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("No refresh token cookie was sent")]
    MissingRefreshToken,
    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<DomainError> for ServerError {
    fn from(err: DomainError) -> Self {
        ServerError::Database(err.into())
    }
}

fn domain_status(err: DomainError) -> StatusCode {
    match err {
        DomainError::EmptyString
        | DomainError::PrivateConversation
        | DomainError::WrongData
        | DomainError::InvalidPassword => StatusCode::BAD_REQUEST,
        DomainError::WrongPassword => StatusCode::UNAUTHORIZED,
        DomainError::CannotAddUser
        | DomainError::CannotKick
        | DomainError::Forbidden
        | DomainError::UserKicked
        | DomainError::Blocked
        | DomainError::CommentsDisabled => StatusCode::FORBIDDEN,
        DomainError::NotFound | DomainError::DeletedUser => StatusCode::NOT_FOUND,
        DomainError::AlreadyExists => StatusCode::CONFLICT,
        DomainError::InconsistentData => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::Token(TokenError::Expired) | ServerError::MissingRefreshToken => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::Token(TokenError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ServerError::Database(err) => err
                .domain()
                .map_or(StatusCode::INTERNAL_SERVER_ERROR, domain_status),
            ServerError::JsonResponse(_) | ServerError::Token(TokenError::Sign(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text safe to show to clients. Only domain errors have one.
    fn public_message(&self) -> Option<String> {
        match self {
            ServerError::Database(err) => err.domain().map(|err| err.to_string()),
            _ => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            error: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}
