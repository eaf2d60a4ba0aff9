use crate::server::{
    Result, ServerError, ServerRouter,
    auth::MaybeUser,
    json::Json,
    query::Query,
    routes::{PageParams, PostList},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warble_common::model::tag::Tag;
use warble_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_tags)
        .typed_get(get_popular_tags)
        .typed_get(get_tag_posts)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct TagList {
    tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    has_more: Option<bool>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tags", rejection(ServerError))]
struct TagsPath();

async fn get_tags(
    TagsPath(): TagsPath,
    State(db): State<Arc<DbClient>>,
    Query(params): Query<PageParams>,
) -> Result<Json<TagList>> {
    let tags = db.tags(params.page).await?;

    Ok(Json(TagList {
        tags: tags.items,
        has_more: Some(tags.has_more),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tags/popular", rejection(ServerError))]
struct PopularTagsPath();

async fn get_popular_tags(
    PopularTagsPath(): PopularTagsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<TagList>> {
    let tags = db.popular_tags().await?;

    Ok(Json(TagList {
        tags,
        has_more: None,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tags/{tag}/posts", rejection(ServerError))]
struct TagPostsPath {
    tag: String,
}

async fn get_tag_posts(
    TagPostsPath { tag }: TagPostsPath,
    State(db): State<Arc<DbClient>>,
    user: MaybeUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PostList>> {
    let posts = db.tag_posts(tag, user.user_id(), params.page).await?;

    Ok(Json(posts.into()))
}
