//! SQL assembly for every post listing.
//!
//! Posts, comments and responses share one row shape. A [`FeedQuery`] picks
//! the rows through its [`QueryFilter`] and renders a single statement that
//! also aggregates author, counters, the caller's own reaction and favorite
//! flag, and the live media of each post. `$1` is always the caller, or the
//! nil id for anonymous requests.

use sqlx::{
    FromRow, Postgres,
    postgres::{PgArguments, PgRow},
    query::{QueryAs, QueryScalar},
};
use uuid::Uuid;
use warble_common::{
    model::{
        Id,
        post::{PostMarker, SortMode},
        user::UserMarker,
    },
    page::{POSTS_PER_PAGE, Page},
    tags::normalize_tag,
};

/// Exactly one way of selecting posts.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum QueryFilter {
    ByPostId(Id<PostMarker>),
    /// Direct comments of a post, deleted ones included.
    ByCommentParent(Id<PostMarker>),
    ByResponseParent(Id<PostMarker>),
    ByUserId(Id<UserMarker>),
    /// Posts the caller marked as favorite.
    FavoritesOf,
    ByTag(String),
    BySearch(String),
    RootFeed,
}

impl QueryFilter {
    #[must_use]
    pub fn is_single(&self) -> bool {
        matches!(self, QueryFilter::ByPostId(_))
    }

    fn condition(&self, args: &mut SqlArgs) -> String {
        match self {
            QueryFilter::ByPostId(id) => {
                format!("p.id = {}", args.push(SqlArg::Uuid(id.get())))
            }
            QueryFilter::ByCommentParent(id) => format!(
                "p.comment_to_id = {} AND p.response_to_id IS NULL",
                args.push(SqlArg::Uuid(id.get()))
            ),
            QueryFilter::ByResponseParent(id) => {
                format!("p.response_to_id = {}", args.push(SqlArg::Uuid(id.get())))
            }
            QueryFilter::ByUserId(id) => format!(
                "p.comment_to_id IS NULL AND p.user_id = {} AND p.is_deleted = FALSE",
                args.push(SqlArg::Uuid(id.get()))
            ),
            QueryFilter::FavoritesOf => format!(
                "EXISTS (
                SELECT 1 FROM favorite_posts AS f
                WHERE f.post_id = p.id AND f.user_id = {}
            )",
                args.caller()
            ),
            QueryFilter::ByTag(tag) => format!(
                "p.is_deleted = FALSE AND EXISTS (
                SELECT 1 FROM post_tags AS pt
                INNER JOIN tags AS t ON pt.tag_id = t.id
                WHERE pt.post_id = p.id AND t.name = {}
            )",
                args.push(SqlArg::Text(tag.clone()))
            ),
            QueryFilter::BySearch(search) => format!(
                "p.post_tsv @@ plainto_tsquery('english', {})",
                args.push(SqlArg::Text(search.clone()))
            ),
            QueryFilter::RootFeed => "p.comment_to_id IS NULL AND p.is_deleted = FALSE".to_owned(),
        }
    }
}

/// Loosely populated selection parameters as they arrive from a request.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct QueryParams {
    pub post_id: Option<Id<PostMarker>>,
    pub comments_to_id: Option<Id<PostMarker>>,
    pub response_to_id: Option<Id<PostMarker>>,
    pub user_id: Option<Id<UserMarker>>,
    pub is_favorite: bool,
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl QueryParams {
    /// The first populated parameter wins, in declaration order.
    #[must_use]
    pub fn into_filter(self) -> QueryFilter {
        let non_empty = |value: Option<String>| value.filter(|value| !value.is_empty());

        if let Some(id) = self.post_id {
            QueryFilter::ByPostId(id)
        } else if let Some(id) = self.comments_to_id {
            QueryFilter::ByCommentParent(id)
        } else if let Some(id) = self.response_to_id {
            QueryFilter::ByResponseParent(id)
        } else if let Some(id) = self.user_id {
            QueryFilter::ByUserId(id)
        } else if self.is_favorite {
            QueryFilter::FavoritesOf
        } else if let Some(tag) = non_empty(self.tag.as_deref().map(normalize_tag)) {
            QueryFilter::ByTag(tag)
        } else if let Some(search) = non_empty(self.search) {
            QueryFilter::BySearch(search)
        } else {
            QueryFilter::RootFeed
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum SqlArg {
    Uuid(Uuid),
    Text(String),
    BigInt(i64),
}

/// Positional arguments, numbered in push order.
#[derive(Clone, Eq, PartialEq, Debug)]
struct SqlArgs {
    caller: Uuid,
    caller_placeholder: Option<String>,
    values: Vec<SqlArg>,
}

impl SqlArgs {
    fn new(caller: Option<Id<UserMarker>>) -> Self {
        Self {
            caller: caller.map_or_else(Uuid::nil, Id::get),
            caller_placeholder: None,
            values: Vec::new(),
        }
    }

    fn push(&mut self, arg: SqlArg) -> String {
        self.values.push(arg);
        format!("${}", self.values.len())
    }

    /// The caller's placeholder, bound on first use.
    fn caller(&mut self) -> String {
        if let Some(placeholder) = &self.caller_placeholder {
            return placeholder.clone();
        }

        let placeholder = self.push(SqlArg::Uuid(self.caller));
        self.caller_placeholder = Some(placeholder.clone());
        placeholder
    }
}

/// Rendered SQL together with the arguments it expects.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

impl BuiltQuery {
    fn from_args(sql: String, args: SqlArgs) -> Self {
        Self {
            sql,
            args: args.values,
        }
    }

    pub fn query_as<O>(&self) -> QueryAs<'_, Postgres, O, PgArguments>
    where
        O: for<'r> FromRow<'r, PgRow>,
    {
        self.args
            .iter()
            .fold(sqlx::query_as(&self.sql), |query, arg| match arg {
                SqlArg::Uuid(value) => query.bind(*value),
                SqlArg::Text(value) => query.bind(value.as_str()),
                SqlArg::BigInt(value) => query.bind(*value),
            })
    }

    pub fn query_scalar<O>(&self) -> QueryScalar<'_, Postgres, O, PgArguments>
    where
        (O,): for<'r> FromRow<'r, PgRow>,
    {
        self.args
            .iter()
            .fold(sqlx::query_scalar(&self.sql), |query, arg| match arg {
                SqlArg::Uuid(value) => query.bind(*value),
                SqlArg::Text(value) => query.bind(value.as_str()),
                SqlArg::BigInt(value) => query.bind(*value),
            })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct FeedQuery {
    pub filter: QueryFilter,
    pub caller: Option<Id<UserMarker>>,
    /// `None` leaves the order to the database.
    pub sort: Option<SortMode>,
    pub page: Page,
}

const SELECT_FEED: &str = "
            SELECT
                p.id,
                p.text,
                p.created_at,
                p.updated_at,
                p.can_comment,
                p.is_deleted,
                u.id AS author_id,
                u.username AS author_username,
                u.name AS author_name,
                u.avatar_url AS author_avatar_url,
                u.avatar_type AS author_avatar_type,
                u.is_deleted AS author_deleted,
                p.original_id,
                p.comment_to_id,
                p.response_to_id,
                COALESCE(pr.likes, 0) AS likes,
                COALESCE(pr.dislikes, 0) AS dislikes,
                COALESCE(pr.reaction, 0) AS reaction,
                pc.count AS comments,
                rc.count AS responses,
                rp.count AS reposts,
                fp.post_id IS NOT NULL AS is_favorite,
                m.media";

impl FeedQuery {
    #[must_use]
    pub fn new(filter: QueryFilter, caller: Option<Id<UserMarker>>) -> Self {
        Self {
            filter,
            caller,
            sort: None,
            page: Page::FIRST,
        }
    }

    #[must_use]
    pub fn sorted(mut self, sort: SortMode) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn build(&self) -> BuiltQuery {
        let mut args = SqlArgs::new(self.caller);
        let caller = args.caller();

        let mut sql = format!(
            "{SELECT_FEED}
            FROM
                posts AS p
                INNER JOIN users AS u ON p.user_id = u.id
                LEFT JOIN LATERAL (
                    SELECT COUNT(*) AS count FROM posts WHERE comment_to_id = p.id
                ) AS pc ON TRUE
                LEFT JOIN LATERAL (
                    SELECT COUNT(*) AS count FROM posts WHERE response_to_id = p.id
                ) AS rc ON TRUE
                LEFT JOIN LATERAL (
                    SELECT COUNT(*) AS count FROM posts WHERE original_id = p.id
                ) AS rp ON TRUE
                LEFT JOIN LATERAL (
                    SELECT
                        COUNT(*) FILTER (WHERE liked) AS likes,
                        COUNT(*) FILTER (WHERE NOT liked) AS dislikes,
                        SUM(CASE WHEN user_id <> {caller} THEN 0 WHEN liked THEN 1 ELSE -1 END) AS reaction
                    FROM post_reactions
                    WHERE post_id = p.id
                ) AS pr ON TRUE
                LEFT JOIN favorite_posts AS fp ON fp.post_id = p.id AND fp.user_id = {caller}
                LEFT JOIN LATERAL (
                    SELECT jsonb_agg(jsonb_build_object(
                        'id', id,
                        'url', url,
                        'urlModifiers', url_modifiers,
                        'type', type,
                        'mime', mime,
                        'subtype', subtype,
                        'width', width,
                        'height', height
                    ) ORDER BY position) AS media
                    FROM post_media
                    WHERE post_id = p.id AND is_deleted = FALSE
                ) AS m ON TRUE
            WHERE
                {}",
            self.filter.condition(&mut args)
        );

        match self.sort {
            Some(SortMode::New) => sql.push_str("\n            ORDER BY p.created_at DESC"),
            Some(SortMode::Old) => sql.push_str("\n            ORDER BY p.created_at ASC"),
            Some(SortMode::Popular) => sql.push_str(
                "\n            ORDER BY COALESCE(pr.likes, 0) + COALESCE(pr.dislikes, 0) ASC, p.created_at ASC",
            ),
            None => {}
        }

        if !self.filter.is_single() {
            let window = self.page.window(POSTS_PER_PAGE);
            let limit = args.push(SqlArg::BigInt(window.limit));
            let offset = args.push(SqlArg::BigInt(window.offset));
            sql.push_str(&format!("\n            LIMIT {limit} OFFSET {offset}"));
        }

        BuiltQuery::from_args(sql, args)
    }

    /// Counts every row the filter matches across all pages.
    #[must_use]
    pub fn count(&self) -> BuiltQuery {
        let mut args = SqlArgs::new(self.caller);
        let sql = format!(
            "
            SELECT COUNT(*)
            FROM posts AS p
            WHERE {}",
            self.filter.condition(&mut args)
        );

        BuiltQuery::from_args(sql, args)
    }
}

#[cfg(test)]
mod tests {
    use crate::feed::{FeedQuery, QueryFilter, QueryParams, SqlArg};
    use uuid::Uuid;
    use warble_common::{
        model::{Id, post::SortMode},
        page::Page,
    };

    fn caller() -> Uuid {
        Uuid::from_u128(0xca11)
    }

    fn post() -> Uuid {
        Uuid::from_u128(0xb0)
    }

    #[test]
    fn root_feed_excludes_comments_and_deleted_posts() {
        let built = FeedQuery::new(QueryFilter::RootFeed, Some(Id::new(caller())))
            .sorted(SortMode::New)
            .page(Page::new(3).unwrap())
            .build();

        assert!(built.sql.contains("p.comment_to_id IS NULL AND p.is_deleted = FALSE"));
        assert!(built.sql.contains("ORDER BY p.created_at DESC"));
        assert!(built.sql.ends_with("LIMIT $2 OFFSET $3"));
        assert_eq!(
            built.args,
            [
                SqlArg::Uuid(caller()),
                SqlArg::BigInt(10),
                SqlArg::BigInt(20)
            ]
        );
    }

    #[test]
    fn anonymous_caller_is_nil_uuid() {
        let built = FeedQuery::new(QueryFilter::RootFeed, None).build();
        assert_eq!(built.args[0], SqlArg::Uuid(Uuid::nil()));
        assert!(built.sql.contains("fp.user_id = $1"));
        assert!(built.sql.contains("WHEN user_id <> $1 THEN 0"));
    }

    #[test]
    fn single_lookup_is_not_paged() {
        let built = FeedQuery::new(QueryFilter::ByPostId(Id::new(post())), None).build();
        assert!(built.sql.contains("p.id = $2"));
        assert!(!built.sql.contains("LIMIT"));
        assert!(!built.sql.contains("ORDER BY p."));
        assert_eq!(built.args, [SqlArg::Uuid(Uuid::nil()), SqlArg::Uuid(post())]);
    }

    #[test]
    fn comment_listing_excludes_responses() {
        let built = FeedQuery::new(QueryFilter::ByCommentParent(Id::new(post())), None).build();
        assert!(
            built
                .sql
                .contains("p.comment_to_id = $2 AND p.response_to_id IS NULL")
        );
        assert!(!built.sql.contains("p.is_deleted = FALSE"));

        let built = FeedQuery::new(QueryFilter::ByResponseParent(Id::new(post())), None).build();
        assert!(built.sql.contains("p.response_to_id = $2"));
    }

    #[test]
    fn popular_sort_is_least_interacted_first() {
        let built = FeedQuery::new(QueryFilter::RootFeed, None)
            .sorted(SortMode::Popular)
            .build();
        assert!(built.sql.contains(
            "ORDER BY COALESCE(pr.likes, 0) + COALESCE(pr.dislikes, 0) ASC, p.created_at ASC"
        ));

        let built = FeedQuery::new(QueryFilter::RootFeed, None)
            .sorted(SortMode::Old)
            .build();
        assert!(built.sql.contains("ORDER BY p.created_at ASC"));
    }

    #[test]
    fn text_filters_bind_their_value() {
        let built = FeedQuery::new(QueryFilter::ByTag("world".to_owned()), None).build();
        assert!(built.sql.contains("t.name = $2"));
        assert_eq!(built.args[1], SqlArg::Text("world".to_owned()));

        let built = FeedQuery::new(QueryFilter::BySearch("hello there".to_owned()), None).build();
        assert!(built.sql.contains("plainto_tsquery('english', $2)"));
        assert_eq!(built.args[1], SqlArg::Text("hello there".to_owned()));
    }

    #[test]
    fn count_binds_caller_only_when_needed() {
        let root = FeedQuery::new(QueryFilter::RootFeed, Some(Id::new(caller()))).count();
        assert!(root.args.is_empty());
        assert!(!root.sql.contains('$'));

        let by_user = FeedQuery::new(QueryFilter::ByUserId(Id::new(post())), None).count();
        assert!(by_user.sql.contains("p.user_id = $1"));
        assert_eq!(by_user.args, [SqlArg::Uuid(post())]);

        let favorites = FeedQuery::new(QueryFilter::FavoritesOf, Some(Id::new(caller()))).count();
        assert!(favorites.sql.contains("f.user_id = $1"));
        assert_eq!(favorites.args, [SqlArg::Uuid(caller())]);
    }

    #[test]
    fn favorites_reuse_the_caller_placeholder() {
        let built = FeedQuery::new(QueryFilter::FavoritesOf, Some(Id::new(caller()))).build();
        assert!(built.sql.contains("f.user_id = $1"));
        assert_eq!(built.args.len(), 3);
        assert!(built.sql.ends_with("LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn params_resolve_in_priority_order() {
        let id = Id::new(post());
        let params = QueryParams {
            post_id: Some(id),
            comments_to_id: Some(id),
            tag: Some("x".to_owned()),
            ..QueryParams::default()
        };
        assert_eq!(params.into_filter(), QueryFilter::ByPostId(id));

        let params = QueryParams {
            response_to_id: Some(id),
            user_id: Some(id.cast()),
            ..QueryParams::default()
        };
        assert_eq!(params.into_filter(), QueryFilter::ByResponseParent(id));

        let params = QueryParams {
            is_favorite: true,
            search: Some("q".to_owned()),
            ..QueryParams::default()
        };
        assert_eq!(params.into_filter(), QueryFilter::FavoritesOf);

        let params = QueryParams {
            tag: Some(String::new()),
            search: Some("q".to_owned()),
            ..QueryParams::default()
        };
        assert_eq!(params.into_filter(), QueryFilter::BySearch("q".to_owned()));

        assert_eq!(QueryParams::default().into_filter(), QueryFilter::RootFeed);
    }

    #[test]
    fn tag_param_matches_stored_form() {
        let params = QueryParams {
            tag: Some("#World".to_owned()),
            ..QueryParams::default()
        };
        assert_eq!(params.into_filter(), QueryFilter::ByTag("world".to_owned()));

        let params = QueryParams {
            tag: Some("#".to_owned()),
            ..QueryParams::default()
        };
        assert_eq!(params.into_filter(), QueryFilter::RootFeed);
    }
}
