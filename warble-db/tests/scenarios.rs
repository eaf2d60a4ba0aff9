//! End-to-end flows against a real Postgres. Run with
//! `DATABASE_URL=... cargo test -p warble-db -- --ignored`.

use sqlx::PgPool;
use warble_common::{
    error::DomainError,
    model::{
        Id,
        conversation::{AddUsers, ConversationType, CreateConversation},
        message::CreateMessage,
        post::{CreatePost, FeedPost, Post, PostMarker, PostMedia, SortMode, UpdatePost},
        reaction::{FavoriteRequest, FavoriteState, ReactionRequest, ReactionState},
        user::{NewUser, UserMarker, Username},
    },
    page::{POSTS_PER_PAGE, Page, Paged},
};
use warble_db::{client::DbClient, feed::QueryParams};

async fn register(db: &DbClient, name: &str) -> Id<UserMarker> {
    db.create_user(&NewUser {
        email: format!("{name}@example.com"),
        username: Username::new(name.to_owned()).unwrap(),
        password: "hunter22".to_owned(),
        name: name.to_owned(),
    })
    .await
    .unwrap()
}

async fn post(db: &DbClient, author: Id<UserMarker>, text: &str) -> Id<PostMarker> {
    db.create_post(
        author,
        &CreatePost {
            text: text.to_owned(),
            original_id: None,
            comment_to_id: None,
            response_to_id: None,
            can_comment: true,
            media: Vec::new(),
        },
    )
    .await
    .unwrap()
}

async fn reply(
    db: &DbClient,
    author: Id<UserMarker>,
    comment_to_id: Option<Id<PostMarker>>,
    response_to_id: Option<Id<PostMarker>>,
) -> Id<PostMarker> {
    db.create_post(
        author,
        &CreatePost {
            text: "reply".to_owned(),
            comment_to_id,
            response_to_id,
            can_comment: true,
            ..CreatePost::default()
        },
    )
    .await
    .unwrap()
}

async fn root_feed(db: &DbClient, page: u32, sort: SortMode) -> Paged<FeedPost> {
    db.query_posts(QueryParams::default(), None, sort, Page::new(page).unwrap())
        .await
        .unwrap()
}

fn media(url: &str) -> PostMedia {
    PostMedia {
        id: url.to_owned(),
        url: url.to_owned(),
        kind: "image".to_owned(),
        mime: "image/png".to_owned(),
        subtype: "png".to_owned(),
        width: 10,
        height: 10,
        ..PostMedia::default()
    }
}

async fn fetch(db: &DbClient, post_id: Id<PostMarker>, caller: Id<UserMarker>) -> Post {
    match db.fetch_post(post_id, Some(caller)).await.unwrap() {
        FeedPost::Post(post) => *post,
        FeedPost::Tombstone(_) => panic!("post was deleted"),
    }
}

fn group(name: &str) -> CreateConversation {
    CreateConversation {
        kind: ConversationType::Group,
        name: name.to_owned(),
        add_user_id: None,
        can_add_users: false,
        has_invite_link: false,
    }
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn liking_twice_removes_the_like(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let bob = register(&db, "bob").await;
    let post_id = post(&db, alice, "first").await;
    let like = ReactionRequest {
        post_id,
        liked: true,
    };

    assert_eq!(db.toggle_reaction(bob, like).await.unwrap(), ReactionState::Liked);
    let post = fetch(&db, post_id, bob).await;
    assert_eq!(post.stats.reaction, 1);
    assert_eq!(post.stats.likes, 1);

    assert_eq!(db.toggle_reaction(bob, like).await.unwrap(), ReactionState::None);
    let post = fetch(&db, post_id, bob).await;
    assert_eq!(post.stats.reaction, 0);
    assert_eq!(post.stats.likes, 0);
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn hashtag_lists_post(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let post_id = post(&db, alice, "hello #world").await;

    let posts = db
        .tag_posts("world".to_owned(), None, Page::FIRST)
        .await
        .unwrap();
    assert_eq!(
        posts.items.iter().map(FeedPost::id).collect::<Vec<_>>(),
        [post_id]
    );
    assert!(!posts.has_more);

    let popular = db.popular_tags().await.unwrap();
    assert_eq!(popular[0].name, "world");
    assert_eq!(popular[0].post_count, 1);
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn private_conversation_is_unique_per_pair(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let bob = register(&db, "bob").await;
    let private = |other| CreateConversation {
        kind: ConversationType::Private,
        name: String::new(),
        add_user_id: Some(other),
        can_add_users: false,
        has_invite_link: false,
    };

    db.create_conversation(alice, private(bob)).await.unwrap();

    let again = db.create_conversation(bob, private(alice)).await;
    assert_eq!(
        again.unwrap_err().domain(),
        Some(DomainError::AlreadyExists)
    );
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn leaving_creator_hands_over_group(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let bob = register(&db, "bob").await;
    let carol = register(&db, "carol").await;

    let conversation_id = db.create_conversation(alice, group("club")).await.unwrap();
    db.add_users(
        alice,
        conversation_id,
        &AddUsers {
            users: vec![bob, carol],
        },
    )
    .await
    .unwrap();

    db.leave_conversation(alice, conversation_id).await.unwrap();
    let policy = db.conversation_policy(conversation_id).await.unwrap();
    assert!(policy.creator == bob || policy.creator == carol);

    let rejoin = db.join_conversation(alice, conversation_id).await;
    assert!(rejoin.is_ok());

    db.kick_user(policy.creator, conversation_id, alice)
        .await
        .unwrap();
    let kicked = db.join_conversation(alice, conversation_id).await;
    assert_eq!(kicked.unwrap_err().domain(), Some(DomainError::UserKicked));
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn reading_messages_clears_unread(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let bob = register(&db, "bob").await;

    let conversation_id = db
        .create_conversation(
            alice,
            CreateConversation {
                kind: ConversationType::Private,
                name: String::new(),
                add_user_id: Some(bob),
                can_add_users: false,
                has_invite_link: false,
            },
        )
        .await
        .unwrap();
    db.send_message(
        alice,
        &CreateMessage {
            conversation_id,
            text: Some("hi bob".to_owned()),
            original_id: None,
            response_to_id: None,
            post_id: None,
        },
    )
    .await
    .unwrap();

    let before = db.conversations(bob).await.unwrap();
    assert_eq!(before[0].unread_count, 1);
    assert_eq!(before[0].user.as_ref().and_then(|user| user.id), Some(alice));

    let messages = db
        .messages(bob, conversation_id, Page::FIRST)
        .await
        .unwrap();
    assert_eq!(messages.items.len(), 1);
    assert_eq!(messages.items[0].text.as_deref(), Some("hi bob"));

    let after = db.conversations(bob).await.unwrap();
    assert_eq!(after[0].unread_count, 0);
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn root_feed_skips_comments_and_deleted_posts(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;

    let mut roots = Vec::new();
    for n in 0..POSTS_PER_PAGE {
        roots.push(post(&db, alice, &format!("root {n}")).await);
    }
    let comment = reply(&db, alice, Some(roots[0]), None).await;
    let response = reply(&db, alice, None, Some(comment)).await;
    let deleted = post(&db, alice, "gone").await;
    db.delete_post(alice, deleted).await.unwrap();

    let feed = root_feed(&db, 1, SortMode::New).await;
    let ids: Vec<_> = feed.items.iter().map(FeedPost::id).collect();
    assert_eq!(ids.len(), 10);
    assert!(!feed.has_more);
    assert!(!ids.contains(&comment));
    assert!(!ids.contains(&response));
    assert!(!ids.contains(&deleted));
    assert!(feed.items.iter().all(|item| item.as_post().is_some()));

    let newest = post(&db, alice, "root 10").await;
    let feed = root_feed(&db, 1, SortMode::New).await;
    assert_eq!(feed.items[0].id(), newest);
    assert!(feed.has_more);

    let second = root_feed(&db, 2, SortMode::New).await;
    assert_eq!(second.items.len(), 1);
    assert!(!second.has_more);
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn has_more_follows_page_boundaries(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;

    let empty = root_feed(&db, 1, SortMode::New).await;
    assert!(empty.items.is_empty());
    assert!(!empty.has_more);

    for n in 0..POSTS_PER_PAGE {
        post(&db, alice, &format!("post {n}")).await;
    }
    assert!(!root_feed(&db, 1, SortMode::New).await.has_more);

    post(&db, alice, "one more").await;
    assert!(root_feed(&db, 1, SortMode::New).await.has_more);

    for n in POSTS_PER_PAGE + 1..3 * POSTS_PER_PAGE {
        post(&db, alice, &format!("post {n}")).await;
    }
    assert!(root_feed(&db, 2, SortMode::New).await.has_more);
    let last = root_feed(&db, 3, SortMode::New).await;
    assert_eq!(last.items.len(), 10);
    assert!(!last.has_more);
    let beyond = root_feed(&db, 4, SortMode::New).await;
    assert!(beyond.items.is_empty());
    assert!(!beyond.has_more);
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn comments_skip_responses_and_keep_tombstones(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let bob = register(&db, "bob").await;
    let root = post(&db, alice, "root").await;
    let comment = reply(&db, bob, Some(root), None).await;
    reply(&db, alice, None, Some(comment)).await;
    db.delete_post(bob, comment).await.unwrap();

    let page = db
        .comments(root, Some(alice), SortMode::New, Page::FIRST)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(!page.comments.has_more);
    assert_eq!(
        serde_json::to_value(&page.comments.items).unwrap(),
        serde_json::json!([{ "id": comment, "isDeleted": true }])
    );
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn editing_sets_updated_at(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let post_id = post(&db, alice, "draft").await;

    let before = fetch(&db, post_id, alice).await;
    assert_eq!(before.updated_at, None);
    assert!(serde_json::to_value(&before).unwrap().get("updatedAt").is_none());

    db.update_post(
        alice,
        post_id,
        &UpdatePost {
            text: Some("final".to_owned()),
            ..UpdatePost::default()
        },
    )
    .await
    .unwrap();

    let after = fetch(&db, post_id, alice).await;
    assert_eq!(after.text, "final");
    assert!(after.updated_at.is_some());
    assert!(serde_json::to_value(&after).unwrap().get("updatedAt").is_some());
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn popular_sort_lists_most_reacted_last(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let bob = register(&db, "bob").await;
    let busy = post(&db, alice, "busy").await;
    let quiet = post(&db, alice, "quiet").await;
    let some = post(&db, alice, "some").await;

    for (user, post_id, liked) in [(alice, busy, true), (bob, busy, false), (bob, some, true)] {
        db.toggle_reaction(user, ReactionRequest { post_id, liked })
            .await
            .unwrap();
    }

    let feed = root_feed(&db, 1, SortMode::Popular).await;
    assert_eq!(
        feed.items.iter().map(FeedPost::id).collect::<Vec<_>>(),
        [quiet, some, busy]
    );
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn media_update_drops_unlisted_urls(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let post_id = db
        .create_post(
            alice,
            &CreatePost {
                text: "pics".to_owned(),
                can_comment: true,
                media: vec![media("m1"), media("m2")],
                ..CreatePost::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(fetch(&db, post_id, alice).await.media.len(), 2);

    db.update_post(
        alice,
        post_id,
        &UpdatePost {
            media: Some(vec![media("m2")]),
            ..UpdatePost::default()
        },
    )
    .await
    .unwrap();

    let urls: Vec<String> = fetch(&db, post_id, alice)
        .await
        .media
        .into_iter()
        .map(|media| media.url)
        .collect();
    assert_eq!(urls, ["m2"]);
}

#[sqlx::test]
#[ignore = "needs a database"]
async fn favorite_toggles_on_and_off(pool: PgPool) {
    let db = DbClient::new(pool);
    let alice = register(&db, "alice").await;
    let bob = register(&db, "bob").await;
    let post_id = post(&db, alice, "keeper").await;
    let request = FavoriteRequest { post_id };

    assert_eq!(
        db.toggle_favorite(bob, request).await.unwrap(),
        FavoriteState::Favorited
    );
    let favorites = db.favorite_posts(bob, Page::FIRST).await.unwrap();
    assert_eq!(
        favorites.items.iter().map(FeedPost::id).collect::<Vec<_>>(),
        [post_id]
    );
    assert!(fetch(&db, post_id, bob).await.stats.is_favorite);

    assert_eq!(
        db.toggle_favorite(bob, request).await.unwrap(),
        FavoriteState::NotFavorited
    );
    assert!(db.favorite_posts(bob, Page::FIRST).await.unwrap().items.is_empty());
    assert!(!fetch(&db, post_id, bob).await.stats.is_favorite);
}
