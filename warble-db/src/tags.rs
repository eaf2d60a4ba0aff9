use crate::{
    client::{DbClient, Result},
    feed::{FeedQuery, QueryFilter},
    record::TagRecord,
};
use warble_common::{
    model::{
        Id,
        post::{FeedPost, SortMode},
        tag::Tag,
        user::UserMarker,
    },
    page::{POPULAR_TAGS, Page, Paged, TAGS_PER_PAGE},
    tags::normalize_tag,
};

/// Tags with at least one post, the most used first.
const TAGS_BY_USE: &str = "
    SELECT
        tags.name,
        COUNT(post_tags.post_id) AS post_count,
        tags.created_at
    FROM
        tags
        INNER JOIN post_tags ON post_tags.tag_id = tags.id
    GROUP BY tags.id
    ORDER BY post_count DESC, tags.name
    LIMIT $1 OFFSET $2
";

impl DbClient {
    pub async fn tags(&self, page: Page) -> Result<Paged<Tag>> {
        let window = page.window(TAGS_PER_PAGE);
        let records = sqlx::query_as::<_, TagRecord>(TAGS_BY_USE)
            .bind(window.limit)
            .bind(window.offset)
            .fetch_all(self.pool())
            .await?;

        let total = self.count_tags().await?;
        Ok(Paged::new(
            records.into_iter().map(Tag::from).collect(),
            page.has_more(total, TAGS_PER_PAGE),
        ))
    }

    pub async fn popular_tags(&self) -> Result<Vec<Tag>> {
        let records = sqlx::query_as::<_, TagRecord>(TAGS_BY_USE)
            .bind(i64::from(POPULAR_TAGS))
            .bind(0_i64)
            .fetch_all(self.pool())
            .await?;

        Ok(records.into_iter().map(Tag::from).collect())
    }

    /// Posts carrying `tag`. Tags match case-insensitively, with or without the `#`.
    pub async fn tag_posts(
        &self,
        tag: String,
        caller: Option<Id<UserMarker>>,
        page: Page,
    ) -> Result<Paged<FeedPost>> {
        let tag = normalize_tag(&tag);
        let query = FeedQuery::new(QueryFilter::ByTag(tag), caller)
            .sorted(SortMode::New)
            .page(page);
        self.fetch_feed_page(&query).await
    }
}
