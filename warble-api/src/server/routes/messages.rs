use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warble_common::model::{
    Id,
    message::{CreateMessage, EditMessage, Message, MessageChange, MessageMarker},
};
use warble_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(send_message)
        .typed_patch(edit_message)
        .typed_delete(delete_message)
        .typed_get(get_changes)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/message", rejection(ServerError))]
struct MessagesPath();

async fn send_message(
    MessagesPath(): MessagesPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(message): Json<CreateMessage>,
) -> Result<(StatusCode, Json<Message>)> {
    let message = db.send_message(user.user_id(), &message).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/message/{id}", rejection(ServerError))]
struct MessagePath {
    id: Id<MessageMarker>,
}

async fn edit_message(
    MessagePath { id }: MessagePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(edit): Json<EditMessage>,
) -> Result<Json<Message>> {
    let message = db.edit_message(user.user_id(), id, &edit).await?;

    Ok(Json(message))
}

async fn delete_message(
    MessagePath { id }: MessagePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_message(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/message/{id}/changes", rejection(ServerError))]
struct MessageChangesPath {
    id: Id<MessageMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ChangeList {
    changes: Vec<MessageChange>,
}

async fn get_changes(
    MessageChangesPath { id }: MessageChangesPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ChangeList>> {
    let changes = db.message_changes(user.user_id(), id).await?;

    Ok(Json(ChangeList { changes }))
}
