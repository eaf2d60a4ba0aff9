use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, MaybeUser},
    json::Json,
    query::Query,
    routes::{PageParams, PostList},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warble_common::{
    model::{
        Id,
        user::{ChangeUser, FollowInfo, UserInfo, UserMarker},
    },
    page::Paged,
};
use warble_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_user)
        .typed_patch(change_user)
        .typed_get(get_user_posts)
        .typed_get(get_following)
        .typed_get(get_followers)
        .typed_post(follow)
        .typed_delete(unfollow)
        .typed_post(block)
        .typed_delete(unblock)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserList {
    users: Vec<FollowInfo>,
    has_more: bool,
}

impl From<Paged<FollowInfo>> for UserList {
    fn from(value: Paged<FollowInfo>) -> Self {
        Self {
            users: value.items,
            has_more: value.has_more,
        }
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
) -> Result<Json<UserInfo>> {
    let info = db.user_info(id, user.user_id()).await?;

    Ok(Json(info))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user", rejection(ServerError))]
struct OwnUserPath();

async fn change_user(
    OwnUserPath(): OwnUserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(change): Json<ChangeUser>,
) -> Result<Json<UserInfo>> {
    db.change_user(user.user_id(), &change).await?;
    let info = db.user_info(user.user_id(), Some(user.user_id())).await?;

    Ok(Json(info))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/{id}/posts", rejection(ServerError))]
struct UserPostsPath {
    id: Id<UserMarker>,
}

async fn get_user_posts(
    UserPostsPath { id }: UserPostsPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PostList>> {
    let posts = db.user_posts(id, user.user_id(), params.page).await?;

    Ok(Json(posts.into()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/{id}/following", rejection(ServerError))]
struct FollowingPath {
    id: Id<UserMarker>,
}

async fn get_following(
    FollowingPath { id }: FollowingPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Query(params): Query<PageParams>,
) -> Result<Json<UserList>> {
    let users = db.following(id, user.user_id(), params.page).await?;

    Ok(Json(users.into()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/{id}/followers", rejection(ServerError))]
struct FollowersPath {
    id: Id<UserMarker>,
}

async fn get_followers(
    FollowersPath { id }: FollowersPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Query(params): Query<PageParams>,
) -> Result<Json<UserList>> {
    let users = db.followers(id, user.user_id(), params.page).await?;

    Ok(Json(users.into()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/{id}/follow", rejection(ServerError))]
struct FollowPath {
    id: Id<UserMarker>,
}

async fn follow(
    FollowPath { id }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.follow(id, user.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn unfollow(
    FollowPath { id }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.unfollow(id, user.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/{id}/block", rejection(ServerError))]
struct BlockPath {
    id: Id<UserMarker>,
}

async fn block(
    BlockPath { id }: BlockPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.block(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn unblock(
    BlockPath { id }: BlockPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.unblock(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}
