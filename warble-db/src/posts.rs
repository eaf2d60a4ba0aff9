use crate::{
    client::{DbClient, Result},
    feed::{FeedQuery, QueryFilter, QueryParams},
    pagination::CommentTotals,
    record::{FeedRecord, MediaRowRecord, PostChangeRecord, PostRefRecord},
};
use sqlx::{Postgres, Transaction};
use tracing::debug;
use warble_common::{
    error::DomainError,
    model::{
        Id, ModelValidationError,
        post::{
            CreatePost, FeedPost, PostHistory, PostMarker, PostMedia, PostRef, SortMode,
            UpdatePost, check_post_text,
        },
        reaction::{
            FavoriteAction, FavoriteRequest, FavoriteState, ReactionAction, ReactionRequest,
            ReactionState,
        },
        user::UserMarker,
    },
    page::{POSTS_PER_PAGE, Page, Paged},
    tags::extract_tags,
};

/// A comment listing together with the reply totals of its post.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CommentPage {
    pub comments: Paged<FeedPost>,
    pub total: i64,
}

impl DbClient {
    pub async fn fetch_feed(&self, query: &FeedQuery) -> Result<Vec<FeedPost>> {
        let records = query
            .build()
            .query_as::<FeedRecord>()
            .fetch_all(self.pool())
            .await?;

        let posts = records
            .into_iter()
            .map(FeedPost::try_from)
            .collect::<Result<_, ModelValidationError>>()?;
        Ok(posts)
    }

    pub async fn fetch_feed_page(&self, query: &FeedQuery) -> Result<Paged<FeedPost>> {
        let posts = self.fetch_feed(query).await?;
        let has_more = self.has_more_posts(query).await?;
        Ok(Paged::new(posts, has_more))
    }

    pub async fn fetch_post(
        &self,
        post_id: Id<PostMarker>,
        caller: Option<Id<UserMarker>>,
    ) -> Result<FeedPost> {
        let mut posts = self
            .fetch_feed(&FeedQuery::new(QueryFilter::ByPostId(post_id), caller))
            .await?;

        match posts.len() {
            0 => Err(DomainError::NotFound.into()),
            1 => Ok(posts.remove(0)),
            _ => Err(DomainError::InconsistentData.into()),
        }
    }

    /// A listing selected by loosely populated request parameters.
    pub async fn query_posts(
        &self,
        params: QueryParams,
        caller: Option<Id<UserMarker>>,
        sort: SortMode,
        page: Page,
    ) -> Result<Paged<FeedPost>> {
        let filter = params.into_filter();
        let query = if filter.is_single() {
            FeedQuery::new(filter, caller)
        } else {
            FeedQuery::new(filter, caller).sorted(sort).page(page)
        };
        self.fetch_feed_page(&query).await
    }

    pub async fn user_posts(
        &self,
        user_id: Id<UserMarker>,
        caller: Option<Id<UserMarker>>,
        page: Page,
    ) -> Result<Paged<FeedPost>> {
        let query = FeedQuery::new(QueryFilter::ByUserId(user_id), caller)
            .sorted(SortMode::New)
            .page(page);
        self.fetch_feed_page(&query).await
    }

    pub async fn favorite_posts(&self, caller: Id<UserMarker>, page: Page) -> Result<Paged<FeedPost>> {
        let query = FeedQuery::new(QueryFilter::FavoritesOf, Some(caller))
            .sorted(SortMode::New)
            .page(page);
        self.fetch_feed_page(&query).await
    }

    pub async fn search_posts(
        &self,
        search: String,
        caller: Option<Id<UserMarker>>,
        page: Page,
    ) -> Result<Paged<FeedPost>> {
        if search.trim().is_empty() {
            return Err(DomainError::EmptyString.into());
        }

        let query = FeedQuery::new(QueryFilter::BySearch(search), caller)
            .sorted(SortMode::New)
            .page(page);
        self.fetch_feed_page(&query).await
    }

    pub async fn comments(
        &self,
        post_id: Id<PostMarker>,
        caller: Option<Id<UserMarker>>,
        sort: SortMode,
        page: Page,
    ) -> Result<CommentPage> {
        let query = FeedQuery::new(QueryFilter::ByCommentParent(post_id), caller)
            .sorted(sort)
            .page(page);
        let comments = self.fetch_feed(&query).await?;
        let totals: CommentTotals = self.comment_totals(post_id).await?;

        Ok(CommentPage {
            comments: Paged::new(comments, totals.has_more(page)),
            total: totals.total,
        })
    }

    pub async fn responses(
        &self,
        comment_id: Id<PostMarker>,
        caller: Option<Id<UserMarker>>,
        sort: SortMode,
        page: Page,
    ) -> Result<CommentPage> {
        let query = FeedQuery::new(QueryFilter::ByResponseParent(comment_id), caller)
            .sorted(sort)
            .page(page);
        let responses = self.fetch_feed(&query).await?;
        let total = self.count_responses(comment_id).await?;

        Ok(CommentPage {
            comments: Paged::new(responses, page.has_more(total, POSTS_PER_PAGE)),
            total,
        })
    }

    pub async fn fetch_post_ref(&self, post_id: Id<PostMarker>) -> Result<Option<PostRef>> {
        let record = sqlx::query_as::<_, PostRefRecord>(
            "
            SELECT
                posts.id,
                posts.user_id,
                posts.comment_to_id,
                posts.can_comment,
                posts.is_deleted
            FROM
                posts
            WHERE
                posts.id = $1
            ",
        )
        .bind(post_id.get())
        .fetch_optional(self.pool())
        .await?;

        Ok(record.map(PostRef::from))
    }

    /// A live post the caller may modify.
    async fn owned_post(
        &self,
        post_id: Id<PostMarker>,
        caller: Id<UserMarker>,
    ) -> Result<PostRef> {
        let post = self
            .fetch_post_ref(post_id)
            .await?
            .filter(|post| !post.is_deleted)
            .ok_or(DomainError::NotFound)?;

        if post.author != caller {
            return Err(DomainError::Forbidden.into());
        }

        Ok(post)
    }

    /// Resolves and checks the parents of a new reply. Returns the root post id.
    async fn reply_target(
        &self,
        author: Id<UserMarker>,
        post: &CreatePost,
    ) -> Result<Option<Id<PostMarker>>> {
        let mut comment_to_id = post.comment_to_id;

        if let Some(response_to_id) = post.response_to_id {
            let parent = self
                .fetch_post_ref(response_to_id)
                .await?
                .ok_or(DomainError::NotFound)?;
            let root = parent.comment_to_id.ok_or(DomainError::WrongData)?;

            match comment_to_id {
                Some(id) if id != root => return Err(DomainError::WrongData.into()),
                _ => comment_to_id = Some(root),
            }
        }

        let Some(root_id) = comment_to_id else {
            return Ok(None);
        };

        let root = self
            .fetch_post_ref(root_id)
            .await?
            .filter(|root| !root.is_deleted)
            .ok_or(DomainError::NotFound)?;

        if !root.can_comment {
            return Err(DomainError::CommentsDisabled.into());
        }
        if self.is_blocked(root.author, author).await? {
            return Err(DomainError::Blocked.into());
        }

        Ok(Some(root_id))
    }

    pub async fn create_post(
        &self,
        author: Id<UserMarker>,
        post: &CreatePost,
    ) -> Result<Id<PostMarker>> {
        debug!(%author, "Creating post");

        check_post_text(&post.text).map_err(ModelValidationError::from)?;
        if post.text.trim().is_empty() && post.media.is_empty() {
            return Err(DomainError::EmptyString.into());
        }

        let comment_to_id = self.reply_target(author, post).await?;
        let post_id = Id::<PostMarker>::random();

        let mut tx = self.begin().await?;

        sqlx::query(
            "
            INSERT INTO posts (id, user_id, text, original_id, comment_to_id, response_to_id, can_comment)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(post_id.get())
        .bind(author.get())
        .bind(&post.text)
        .bind(post.original_id.map(Id::get))
        .bind(comment_to_id.map(Id::get))
        .bind(post.response_to_id.map(Id::get))
        .bind(post.can_comment)
        .execute(&mut *tx)
        .await?;

        upsert_media(&mut tx, post_id, &post.media).await?;
        attach_tags(&mut tx, post_id, &extract_tags(&post.text)).await?;

        tx.commit().await?;
        Ok(post_id)
    }

    pub async fn update_post(
        &self,
        caller: Id<UserMarker>,
        post_id: Id<PostMarker>,
        update: &UpdatePost,
    ) -> Result<()> {
        if update.is_empty() {
            return Err(DomainError::WrongData.into());
        }
        if let Some(text) = &update.text {
            check_post_text(text).map_err(ModelValidationError::from)?;
        }

        self.owned_post(post_id, caller).await?;

        let mut tx = self.begin().await?;

        let previous_text = sqlx::query_scalar::<_, String>(
            "
            SELECT text FROM posts WHERE id = $1 FOR UPDATE
            ",
        )
        .bind(post_id.get())
        .fetch_one(&mut *tx)
        .await?;

        if update.text.as_ref().is_some_and(|text| *text != previous_text) {
            record_change(&mut tx, post_id, &previous_text, false).await?;
        }

        sqlx::query(
            "
            UPDATE posts SET
                text = COALESCE($2, text),
                can_comment = COALESCE($3, can_comment),
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(post_id.get())
        .bind(update.text.as_deref())
        .bind(update.can_comment)
        .execute(&mut *tx)
        .await?;

        if let Some(media) = &update.media {
            let urls: Vec<String> = media.iter().map(|media| media.url.clone()).collect();
            sqlx::query(
                "
                UPDATE post_media SET
                    is_deleted = TRUE,
                    updated_at = now()
                WHERE post_id = $1 AND is_deleted = FALSE AND url <> ALL($2)
                ",
            )
            .bind(post_id.get())
            .bind(urls)
            .execute(&mut *tx)
            .await?;

            upsert_media(&mut tx, post_id, media).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_post(&self, caller: Id<UserMarker>, post_id: Id<PostMarker>) -> Result<()> {
        self.owned_post(post_id, caller).await?;

        let mut tx = self.begin().await?;

        let text = sqlx::query_scalar::<_, String>(
            "
            UPDATE posts SET is_deleted = TRUE
            WHERE id = $1
            RETURNING text
            ",
        )
        .bind(post_id.get())
        .fetch_one(&mut *tx)
        .await?;

        record_change(&mut tx, post_id, &text, true).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn post_history(
        &self,
        caller: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<PostHistory> {
        let post = self
            .fetch_post_ref(post_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if post.author != caller {
            return Err(DomainError::Forbidden.into());
        }

        let changes = sqlx::query_as::<_, PostChangeRecord>(
            "
            SELECT id, created_at, text, is_deleted
            FROM post_changes
            WHERE post_id = $1
            ORDER BY created_at
            ",
        )
        .bind(post_id.get())
        .fetch_all(self.pool())
        .await?;

        let media = sqlx::query_as::<_, MediaRowRecord>(
            "
            SELECT
                id, post_id, created_at, updated_at, url, url_modifiers,
                type, mime, subtype, width, height, is_deleted
            FROM post_media
            WHERE post_id = $1
            ORDER BY position, created_at
            ",
        )
        .bind(post_id.get())
        .fetch_all(self.pool())
        .await?;

        Ok(PostHistory {
            changes: changes.into_iter().map(Into::into).collect(),
            media: media.into_iter().map(Into::into).collect(),
        })
    }

    /// Check-then-act without locking: two concurrent toggles may race.
    pub async fn toggle_reaction(
        &self,
        user: Id<UserMarker>,
        request: ReactionRequest,
    ) -> Result<ReactionState> {
        let stored = sqlx::query_scalar::<_, bool>(
            "
            SELECT liked FROM post_reactions WHERE post_id = $1 AND user_id = $2
            ",
        )
        .bind(request.post_id.get())
        .bind(user.get())
        .fetch_optional(self.pool())
        .await?;

        let (action, state) = ReactionState::from_stored(stored).toggle(request.liked);
        debug!(%user, post = %request.post_id, ?action, "Toggling reaction");

        let query = match action {
            ReactionAction::Insert { liked } => sqlx::query(
                "
                INSERT INTO post_reactions (post_id, user_id, liked) VALUES ($1, $2, $3)
                ",
            )
            .bind(request.post_id.get())
            .bind(user.get())
            .bind(liked),
            ReactionAction::Update { liked } => sqlx::query(
                "
                UPDATE post_reactions SET liked = $3 WHERE post_id = $1 AND user_id = $2
                ",
            )
            .bind(request.post_id.get())
            .bind(user.get())
            .bind(liked),
            ReactionAction::Delete => sqlx::query(
                "
                DELETE FROM post_reactions WHERE post_id = $1 AND user_id = $2
                ",
            )
            .bind(request.post_id.get())
            .bind(user.get()),
        };
        query.execute(self.pool()).await?;

        Ok(state)
    }

    pub async fn toggle_favorite(
        &self,
        user: Id<UserMarker>,
        request: FavoriteRequest,
    ) -> Result<FavoriteState> {
        let favorited = sqlx::query_scalar::<_, bool>(
            "
            SELECT EXISTS (SELECT 1 FROM favorite_posts WHERE post_id = $1 AND user_id = $2)
            ",
        )
        .bind(request.post_id.get())
        .bind(user.get())
        .fetch_one(self.pool())
        .await?;

        let current = if favorited {
            FavoriteState::Favorited
        } else {
            FavoriteState::NotFavorited
        };
        let (action, state) = current.toggle();

        let sql = match action {
            FavoriteAction::Insert => {
                "
                INSERT INTO favorite_posts (post_id, user_id) VALUES ($1, $2)
                "
            }
            FavoriteAction::Delete => {
                "
                DELETE FROM favorite_posts WHERE post_id = $1 AND user_id = $2
                "
            }
        };
        sqlx::query(sql)
            .bind(request.post_id.get())
            .bind(user.get())
            .execute(self.pool())
            .await?;

        Ok(state)
    }
}

/// Inserts media in list order. Media that already exists is revived and reordered.
async fn upsert_media(
    tx: &mut Transaction<'static, Postgres>,
    post_id: Id<PostMarker>,
    media: &[PostMedia],
) -> Result<()> {
    for (position, media) in media.iter().enumerate() {
        let position = i32::try_from(position).map_err(|_| DomainError::WrongData)?;

        sqlx::query(
            "
            INSERT INTO post_media
                (id, post_id, position, url, url_modifiers, type, mime, subtype, width, height)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                is_deleted = FALSE,
                position = EXCLUDED.position,
                updated_at = now()
            WHERE post_media.post_id = EXCLUDED.post_id
            ",
        )
        .bind(&media.id)
        .bind(post_id.get())
        .bind(position)
        .bind(&media.url)
        .bind(&media.url_modifiers)
        .bind(&media.kind)
        .bind(&media.mime)
        .bind(&media.subtype)
        .bind(media.width)
        .bind(media.height)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn attach_tags(
    tx: &mut Transaction<'static, Postgres>,
    post_id: Id<PostMarker>,
    tags: &[String],
) -> Result<()> {
    if tags.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "
        INSERT INTO tags (name)
        SELECT UNNEST($1::text[])
        ON CONFLICT (name) DO NOTHING
        ",
    )
    .bind(tags)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "
        INSERT INTO post_tags (post_id, tag_id)
        SELECT $1, tags.id FROM tags WHERE tags.name = ANY($2)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(post_id.get())
    .bind(tags)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn record_change(
    tx: &mut Transaction<'static, Postgres>,
    post_id: Id<PostMarker>,
    text: &str,
    is_deleted: bool,
) -> Result<()> {
    sqlx::query(
        "
        INSERT INTO post_changes (post_id, text, is_deleted)
        VALUES ($1, $2, $3)
        ",
    )
    .bind(post_id.get())
    .bind(text)
    .bind(is_deleted)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
