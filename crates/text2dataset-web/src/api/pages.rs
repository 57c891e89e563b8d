use axum::{
    extract::{Path, Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use text2dataset_core::{ChatTarget, CommunityShare, Error};
use uuid::Uuid;

use super::{CHAT_LIMIT, HISTORY_LIMIT};
use crate::error::AppResult;
use crate::session::CurrentUser;
use crate::state::AppState;
use crate::templates::{
    render, CommunityTemplate, GlobalChatTemplate, HistoryTemplate, IndexTemplate, ViewTemplate,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/history", get(history))
        .route("/community", get(community))
        .route("/global_chat_page", get(global_chat))
        .route("/view/{dataset_id}", get(view_dataset))
        .route("/health", get(health))
}

async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    render(&IndexTemplate::new(user.as_ref(), state.config.max_file_size))
}

async fn history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let entries = state.store.list_history(None, HISTORY_LIMIT).await?;
    render(&HistoryTemplate::new(user.as_ref(), &entries))
}

#[derive(Debug, Default, Deserialize)]
pub struct CommunityQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub sort: Option<String>,
}

impl CommunityQuery {
    fn is_popular(&self) -> bool {
        self.sort.as_deref() == Some("popular")
    }

    /// Matching shares, newest first unless sorted by popularity.
    pub async fn run(&self, state: &AppState) -> AppResult<Vec<CommunityShare>> {
        let tag = Some(self.tag.as_str()).filter(|t| !t.trim().is_empty());
        let mut shares = state.store.search_shares(&self.q, tag).await?;
        if self.is_popular() {
            shares.sort_by_key(|s| std::cmp::Reverse(s.popularity()));
        }
        Ok(shares)
    }
}

async fn community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CommunityQuery>,
) -> AppResult<Html<String>> {
    let shares = query.run(&state).await?;
    render(&CommunityTemplate::new(
        user.as_ref(),
        &shares,
        &query.q,
        &query.tag,
        query.is_popular(),
    ))
}

async fn global_chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let messages = state.store.list_messages(ChatTarget::Global, CHAT_LIMIT).await?;
    render(&GlobalChatTemplate::new(user.as_ref(), &messages))
}

async fn view_dataset(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(dataset_id): Path<Uuid>,
) -> AppResult<Html<String>> {
    let dataset = state.store.get_dataset(dataset_id).await?;
    if dataset.is_expired_at(Utc::now()) {
        return Err(Error::Expired(dataset_id).into());
    }

    let share = state.store.share_for_dataset(dataset_id).await?;
    let messages = state
        .store
        .list_messages(ChatTarget::Dataset(dataset_id), CHAT_LIMIT)
        .await?;

    render(&ViewTemplate::new(
        user.as_ref(),
        &dataset,
        share.as_ref(),
        &messages,
    ))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        storage: state.store.backend(),
    })
}
