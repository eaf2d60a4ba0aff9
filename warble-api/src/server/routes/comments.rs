use crate::server::{
    Result, ServerError, ServerRouter, auth::MaybeUser, json::Json, query::Query,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warble_common::{
    model::{
        Id,
        post::{FeedPost, PostMarker, SortMode},
    },
    page::Page,
};
use warble_db::{client::DbClient, posts::CommentPage};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_comments)
        .typed_get(get_responses)
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentParams {
    post_id: Id<PostMarker>,
    #[serde(default)]
    page: Page,
    #[serde(default)]
    sort: SortMode,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentList {
    comments: Vec<FeedPost>,
    total: i64,
    has_more: bool,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comment", rejection(ServerError))]
struct CommentsPath();

async fn get_comments(
    CommentsPath(): CommentsPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Query(params): Query<CommentParams>,
) -> Result<Json<CommentList>> {
    let CommentPage { comments, total } = db
        .comments(params.post_id, user.user_id(), params.sort, params.page)
        .await?;

    Ok(Json(CommentList {
        comments: comments.items,
        total,
        has_more: comments.has_more,
    }))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct ResponseParams {
    #[serde(default)]
    page: Page,
    #[serde(default)]
    sort: SortMode,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseList {
    responses: Vec<FeedPost>,
    total: i64,
    has_more: bool,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comment/{id}", rejection(ServerError))]
struct CommentPath {
    id: Id<PostMarker>,
}

async fn get_responses(
    CommentPath { id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Query(params): Query<ResponseParams>,
) -> Result<Json<ResponseList>> {
    let CommentPage { comments, total } = db
        .responses(id, user.user_id(), params.sort, params.page)
        .await?;

    Ok(Json(ResponseList {
        responses: comments.items,
        total,
        has_more: comments.has_more,
    }))
}
