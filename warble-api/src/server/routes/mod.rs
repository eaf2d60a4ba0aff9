use crate::server::ServerRouter;
use axum::Router;
use serde::{Deserialize, Serialize};
use warble_common::{
    model::{Id, post::FeedPost},
    page::{Page, Paged},
};

mod auth;
mod comments;
mod conversations;
mod messages;
mod posts;
mod tags;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(auth::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(users::routes())
        .merge(tags::routes())
        .merge(conversations::routes())
        .merge(messages::routes())
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct PageParams {
    #[serde(default)]
    page: Page,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(bound = "")]
struct Created<Marker> {
    id: Id<Marker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostList {
    posts: Vec<FeedPost>,
    has_more: bool,
}

impl From<Paged<FeedPost>> for PostList {
    fn from(value: Paged<FeedPost>) -> Self {
        Self {
            posts: value.items,
            has_more: value.has_more,
        }
    }
}
