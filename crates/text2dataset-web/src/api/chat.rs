use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use text2dataset_core::{ChatMessage, ChatTarget};
use uuid::Uuid;

use super::CHAT_LIMIT;
use crate::error::AppResult;
use crate::session::RequireUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/{dataset_id}", get(dataset_messages).post(post_dataset_message))
        .route("/global_chat", get(global_messages).post(post_global_message))
}

#[derive(Debug, Deserialize)]
pub struct MessageForm {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
}

async fn post_message(state: &AppState, author: String, body: &str, target: ChatTarget) -> AppResult<()> {
    let message = ChatMessage::new(author, body, target)?;
    state.store.insert_message(&message).await?;
    tracing::debug!(chat = %target.key(), author = %message.author, "Chat message posted");
    Ok(())
}

async fn dataset_messages(
    State(state): State<AppState>,
    Path(dataset_id): Path<Uuid>,
) -> AppResult<Json<MessagesResponse>> {
    state.store.get_dataset(dataset_id).await?;
    let messages = state
        .store
        .list_messages(ChatTarget::Dataset(dataset_id), CHAT_LIMIT)
        .await?;
    Ok(Json(MessagesResponse { messages }))
}

async fn post_dataset_message(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(dataset_id): Path<Uuid>,
    Form(form): Form<MessageForm>,
) -> AppResult<Redirect> {
    state.store.get_dataset(dataset_id).await?;
    post_message(&state, user.username, &form.message, ChatTarget::Dataset(dataset_id)).await?;
    Ok(Redirect::to(&format!("/view/{dataset_id}")))
}

async fn global_messages(State(state): State<AppState>) -> AppResult<Json<MessagesResponse>> {
    let messages = state.store.list_messages(ChatTarget::Global, CHAT_LIMIT).await?;
    Ok(Json(MessagesResponse { messages }))
}

async fn post_global_message(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Form(form): Form<MessageForm>,
) -> AppResult<Redirect> {
    post_message(&state, user.username, &form.message, ChatTarget::Global).await?;
    Ok(Redirect::to("/global_chat_page"))
}
