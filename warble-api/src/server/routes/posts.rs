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
        post::{CreatePost, FeedPost, PostHistory, PostMarker, SortMode, UpdatePost},
        reaction::{FavoriteRequest, FavoriteState, ReactionRequest, ReactionState},
        user::UserMarker,
    },
    page::Page,
};
use warble_db::{client::DbClient, feed::QueryParams};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(get_feed)
        .typed_get(get_post)
        .typed_patch(update_post)
        .typed_delete(delete_post)
        .typed_get(get_history)
        .typed_post(toggle_reaction)
        .typed_post(toggle_favorite)
        .typed_get(get_favorites)
        .typed_get(search_posts)
}

/// Listing parameters. The first selection parameter present picks the listing,
/// none at all gives the root feed.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FeedParams {
    page: Page,
    sort: SortMode,
    post_id: Option<Id<PostMarker>>,
    comments_to_id: Option<Id<PostMarker>>,
    response_to_id: Option<Id<PostMarker>>,
    user_id: Option<Id<UserMarker>>,
    is_favorite: bool,
    tag: Option<String>,
    search: Option<String>,
}

impl FeedParams {
    fn selection(&self) -> QueryParams {
        QueryParams {
            post_id: self.post_id,
            comments_to_id: self.comments_to_id,
            response_to_id: self.response_to_id,
            user_id: self.user_id,
            is_favorite: self.is_favorite,
            tag: self.tag.clone(),
            search: self.search.clone(),
        }
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post", rejection(ServerError))]
struct PostsPath();

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<CreatePost>,
) -> Result<(StatusCode, Json<FeedPost>)> {
    let post_id = db.create_post(user.user_id(), &post).await?;
    let post = db.fetch_post(post_id, Some(user.user_id())).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_feed(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Query(params): Query<FeedParams>,
) -> Result<Json<PostList>> {
    let posts = db
        .query_posts(params.selection(), user.user_id(), params.sort, params.page)
        .await?;

    Ok(Json(posts.into()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
) -> Result<Json<FeedPost>> {
    let post = db.fetch_post(id, user.user_id()).await?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(update): Json<UpdatePost>,
) -> Result<Json<FeedPost>> {
    db.update_post(user.user_id(), id, &update).await?;
    let post = db.fetch_post(id, Some(user.user_id())).await?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_post(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}/history", rejection(ServerError))]
struct PostHistoryPath {
    id: Id<PostMarker>,
}

async fn get_history(
    PostHistoryPath { id }: PostHistoryPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<PostHistory>> {
    let history = db.post_history(user.user_id(), id).await?;

    Ok(Json(history))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/reaction", rejection(ServerError))]
struct ReactionPath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ReactionResponse {
    reaction: ReactionState,
}

async fn toggle_reaction(
    ReactionPath(): ReactionPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<ReactionRequest>,
) -> Result<Json<ReactionResponse>> {
    let reaction = db.toggle_reaction(user.user_id(), request).await?;

    Ok(Json(ReactionResponse { reaction }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/favorite", rejection(ServerError))]
struct FavoritePath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct FavoriteResponse {
    favorite: FavoriteState,
}

async fn toggle_favorite(
    FavoritePath(): FavoritePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<FavoriteRequest>,
) -> Result<Json<FavoriteResponse>> {
    let favorite = db.toggle_favorite(user.user_id(), request).await?;

    Ok(Json(FavoriteResponse { favorite }))
}

async fn get_favorites(
    FavoritePath(): FavoritePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PostList>> {
    let posts = db.favorite_posts(user.user_id(), params.page).await?;

    Ok(Json(posts.into()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/search", rejection(ServerError))]
struct SearchPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    page: Page,
}

async fn search_posts(
    SearchPath(): SearchPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<PostList>> {
    let posts = db
        .search_posts(params.q, user.user_id(), params.page)
        .await?;

    Ok(Json(posts.into()))
}
