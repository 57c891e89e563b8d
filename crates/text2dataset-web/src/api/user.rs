use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use text2dataset_core::HistoryEntry;

use super::HISTORY_LIMIT;
use crate::error::AppResult;
use crate::session::RequireUser;
use crate::state::AppState;

const MAX_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user_datasets", get(user_datasets))
        .route("/api/history", get(recent_history))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(HISTORY_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub datasets: Vec<HistoryEntry>,
}

async fn user_datasets(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<HistoryResponse>> {
    let datasets = state
        .store
        .list_history(Some(&user.username), query.limit())
        .await?;
    Ok(Json(HistoryResponse { datasets }))
}

async fn recent_history(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<HistoryResponse>> {
    let datasets = state.store.list_history(None, query.limit()).await?;
    Ok(Json(HistoryResponse { datasets }))
}
