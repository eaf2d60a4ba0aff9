use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::Json,
    query::Query,
    routes::{Created, PageParams},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warble_common::model::{
    Id,
    conversation::{
        AddUsers, Conversation, ConversationInfo, ConversationMarker, CreateConversation, KickUser,
    },
    message::Message,
};
use warble_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_conversations)
        .typed_post(create_conversation)
        .typed_get(get_conversation)
        .typed_post(add_users)
        .typed_post(kick_user)
        .typed_post(leave)
        .typed_post(join)
        .typed_get(get_messages)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/conversation", rejection(ServerError))]
struct ConversationsPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ConversationList {
    conversations: Vec<Conversation>,
}

async fn get_conversations(
    ConversationsPath(): ConversationsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ConversationList>> {
    let conversations = db.conversations(user.user_id()).await?;

    Ok(Json(ConversationList { conversations }))
}

async fn create_conversation(
    ConversationsPath(): ConversationsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(conversation): Json<CreateConversation>,
) -> Result<(StatusCode, Json<Created<ConversationMarker>>)> {
    let id = db
        .create_conversation(user.user_id(), conversation)
        .await?;

    Ok((StatusCode::CREATED, Json(Created { id })))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/conversation/{id}", rejection(ServerError))]
struct ConversationPath {
    id: Id<ConversationMarker>,
}

async fn get_conversation(
    ConversationPath { id }: ConversationPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ConversationInfo>> {
    let info = db.conversation_info(user.user_id(), id).await?;

    Ok(Json(info))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/conversation/{id}/add", rejection(ServerError))]
struct AddUsersPath {
    id: Id<ConversationMarker>,
}

async fn add_users(
    AddUsersPath { id }: AddUsersPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(users): Json<AddUsers>,
) -> Result<StatusCode> {
    db.add_users(user.user_id(), id, &users).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/conversation/{id}/kick", rejection(ServerError))]
struct KickPath {
    id: Id<ConversationMarker>,
}

async fn kick_user(
    KickPath { id }: KickPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(KickUser { user_id }): Json<KickUser>,
) -> Result<StatusCode> {
    db.kick_user(user.user_id(), id, user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/conversation/{id}/leave", rejection(ServerError))]
struct LeavePath {
    id: Id<ConversationMarker>,
}

async fn leave(
    LeavePath { id }: LeavePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.leave_conversation(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/conversation/{id}/join", rejection(ServerError))]
struct JoinPath {
    id: Id<ConversationMarker>,
}

async fn join(
    JoinPath { id }: JoinPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.join_conversation(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/conversation/{id}/messages", rejection(ServerError))]
struct MessagesPath {
    id: Id<ConversationMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    messages: Vec<Message>,
    has_more: bool,
}

async fn get_messages(
    MessagesPath { id }: MessagesPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(params): Query<PageParams>,
) -> Result<Json<MessageList>> {
    let messages = db.messages(user.user_id(), id, params.page).await?;

    Ok(Json(MessageList {
        messages: messages.items,
        has_more: messages.has_more,
    }))
}
