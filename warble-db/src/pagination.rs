//! Totals behind the `hasMore` flag of every paged listing.

use crate::{
    client::{DbClient, Result},
    feed::{FeedQuery, QueryFilter},
};
use sqlx::FromRow;
use warble_common::{
    model::{Id, conversation::ConversationMarker, post::PostMarker, user::UserMarker},
    page::{POSTS_PER_PAGE, Page},
};

/// Replies below a post. Responses also point at the root post, so `total`
/// includes them while only top-level comments are paged.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub struct CommentTotals {
    pub total: i64,
    pub top_level: i64,
}

impl CommentTotals {
    #[must_use]
    pub fn has_more(self, page: Page) -> bool {
        page.has_more(self.top_level, POSTS_PER_PAGE)
    }
}

impl DbClient {
    /// Rows the query's filter matches over all pages.
    pub async fn count_posts(&self, query: &FeedQuery) -> Result<i64> {
        let total = query
            .count()
            .query_scalar::<i64>()
            .fetch_one(self.pool())
            .await?;

        Ok(total)
    }

    pub async fn has_more_posts(&self, query: &FeedQuery) -> Result<bool> {
        let total = self.count_posts(query).await?;
        Ok(query.page.has_more(total, POSTS_PER_PAGE))
    }

    pub async fn comment_totals(&self, post_id: Id<PostMarker>) -> Result<CommentTotals> {
        let totals = sqlx::query_as::<_, CommentTotals>(
            "
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE response_to_id IS NULL) AS top_level
            FROM
                posts
            WHERE
                comment_to_id = $1
            ",
        )
        .bind(post_id.get())
        .fetch_one(self.pool())
        .await?;

        Ok(totals)
    }

    pub async fn count_responses(&self, comment_id: Id<PostMarker>) -> Result<i64> {
        self.count_posts(&FeedQuery::new(
            QueryFilter::ByResponseParent(comment_id),
            None,
        ))
        .await
    }

    /// Tags that are attached to at least one post.
    pub async fn count_tags(&self) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "
            SELECT COUNT(DISTINCT tag_id) FROM post_tags
            ",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(total)
    }

    /// Live users that `user_id` follows.
    pub async fn count_following(&self, user_id: Id<UserMarker>) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "
            SELECT
                COUNT(*)
            FROM
                users_followers AS f
                INNER JOIN users AS u ON f.user_id = u.id
            WHERE
                f.follower_id = $1 AND u.is_deleted = FALSE
            ",
        )
        .bind(user_id.get())
        .fetch_one(self.pool())
        .await?;

        Ok(total)
    }

    /// Live users following `user_id`.
    pub async fn count_followers(&self, user_id: Id<UserMarker>) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "
            SELECT
                COUNT(*)
            FROM
                users_followers AS f
                INNER JOIN users AS u ON f.follower_id = u.id
            WHERE
                f.user_id = $1 AND u.is_deleted = FALSE
            ",
        )
        .bind(user_id.get())
        .fetch_one(self.pool())
        .await?;

        Ok(total)
    }

    pub async fn count_messages(&self, conversation_id: Id<ConversationMarker>) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "
            SELECT COUNT(*) FROM messages WHERE conversation_id = $1
            ",
        )
        .bind(conversation_id.get())
        .fetch_one(self.pool())
        .await?;

        Ok(total)
    }
}
