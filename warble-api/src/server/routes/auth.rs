use crate::server::{
    CookieConfig, Result, ServerError, ServerRouter, auth::MaybeUser, json::Json,
    routes::Created,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    routing::{RouterExt, TypedPath},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration;
use tracing::debug;
use warble_common::{
    error::DomainError,
    model::{
        auth::{REFRESH_TOKEN_COOKIE, REFRESH_TOKEN_MAX_AGE, TokenKind, TokenService},
        user::{LoginUser, NewUser, UserMarker, Username},
    },
};
use warble_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_get(refresh)
        .typed_get(logout)
        .typed_post(check_email)
        .typed_post(check_username)
}

fn refresh_cookie(token: String, config: CookieConfig) -> Cookie<'static> {
    Cookie::build((REFRESH_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .max_age(REFRESH_TOKEN_MAX_AGE)
        .build()
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct AccessResponse {
    access: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/register", rejection(ServerError))]
struct RegisterPath();

async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    Json(user): Json<NewUser>,
) -> Result<(StatusCode, Json<Created<UserMarker>>)> {
    let id = db.create_user(&user).await?;

    Ok((StatusCode::CREATED, Json(Created { id })))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(tokens): State<Arc<TokenService>>,
    State(cookies): State<CookieConfig>,
    jar: CookieJar,
    Json(login): Json<LoginUser>,
) -> Result<(CookieJar, Json<AccessResponse>)> {
    let user_id = db.login(&login).await?;
    let pair = tokens.issue_pair(user_id)?;

    debug!(%user_id, "User logged in");

    Ok((
        jar.add(refresh_cookie(pair.refresh, cookies)),
        Json(AccessResponse { access: pair.access }),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/refresh", rejection(ServerError))]
struct RefreshPath();

/// Trades a refresh cookie for a new access token and a new cookie.
async fn refresh(
    RefreshPath(): RefreshPath,
    State(db): State<Arc<DbClient>>,
    State(tokens): State<Arc<TokenService>>,
    State(cookies): State<CookieConfig>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AccessResponse>)> {
    let refresh = jar
        .get(REFRESH_TOKEN_COOKIE)
        .ok_or(ServerError::MissingRefreshToken)?;
    let user_id = tokens.verify(TokenKind::Refresh, refresh.value())?;

    let credentials = db
        .fetch_credentials(user_id)
        .await?
        .ok_or(DomainError::NotFound)?;
    if credentials.is_deleted {
        return Err(DomainError::DeletedUser.into());
    }

    let pair = tokens.issue_pair(user_id)?;
    Ok((
        jar.add(refresh_cookie(pair.refresh, cookies)),
        Json(AccessResponse { access: pair.access }),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(cookies): State<CookieConfig>,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    let mut expired = refresh_cookie(String::new(), cookies);
    expired.set_max_age(Duration::ZERO);

    (jar.add(expired), StatusCode::OK)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct EmailCheck {
    email: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/check-email", rejection(ServerError))]
struct CheckEmailPath();

async fn check_email(
    CheckEmailPath(): CheckEmailPath,
    State(db): State<Arc<DbClient>>,
    Json(EmailCheck { email }): Json<EmailCheck>,
) -> Result<Json<ExistsResponse>> {
    let exists = db.email_exists(&email).await?;

    Ok(Json(ExistsResponse { exists }))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct UsernameCheck {
    username: Username,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/check-username", rejection(ServerError))]
struct CheckUsernamePath();

async fn check_username(
    CheckUsernamePath(): CheckUsernamePath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Json(UsernameCheck { username }): Json<UsernameCheck>,
) -> Result<Json<ExistsResponse>> {
    let exists = db.username_exists(&username, user.user_id()).await?;

    Ok(Json(ExistsResponse { exists }))
}

#[cfg(test)]
mod tests {
    use crate::server::{CookieConfig, routes::auth::refresh_cookie};
    use axum_extra::extract::cookie::SameSite;
    use warble_common::model::auth::REFRESH_TOKEN_MAX_AGE;

    #[test]
    fn refresh_cookie_is_http_only() {
        let cookie = refresh_cookie("token".to_owned(), CookieConfig { secure: true });
        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.value(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(REFRESH_TOKEN_MAX_AGE));
    }
}
