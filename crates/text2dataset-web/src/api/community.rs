use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use text2dataset_core::{CommunityShare, Error, LikeOutcome};
use uuid::Uuid;

use super::pages::CommunityQuery;
use crate::error::{AppError, AppResult};
use crate::session::RequireUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/share_dataset", post(share_dataset))
        .route("/like_dataset", post(like_dataset))
        .route("/api/community", get(search))
}

#[derive(Debug, Deserialize)]
pub struct ShareForm {
    pub dataset_id: Uuid,
    pub description: String,
    #[serde(default)]
    pub tags: String,
}

async fn share_dataset(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Form(form): Form<ShareForm>,
) -> AppResult<Redirect> {
    let dataset = state.store.get_dataset(form.dataset_id).await?;
    if !dataset.is_owned_by(&user.username) && !user.is_admin {
        return Err(AppError::Forbidden(
            "Only the owner can share this dataset".into(),
        ));
    }
    if dataset.is_expired_at(Utc::now()) {
        return Err(Error::Expired(dataset.id).into());
    }

    let share = CommunityShare::new(&dataset, user.username, &form.description, &form.tags)?;
    state.store.insert_share(&share).await?;
    tracing::info!(share_id = %share.id, dataset_id = %dataset.id, owner = %share.owner, "Dataset shared");

    Ok(Redirect::to(&format!("/view/{}", dataset.id)))
}

#[derive(Debug, Deserialize)]
pub struct LikeForm {
    pub share_id: Uuid,
}

async fn like_dataset(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Form(form): Form<LikeForm>,
) -> AppResult<Redirect> {
    let outcome = state.store.like_share(form.share_id, &user.username).await?;
    if outcome == LikeOutcome::AlreadyLiked {
        tracing::debug!(share_id = %form.share_id, username = %user.username, "Duplicate like ignored");
    }
    Ok(Redirect::to("/community"))
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub shares: Vec<CommunityShare>,
    pub total: usize,
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<CommunityQuery>,
) -> AppResult<Json<SearchResponse>> {
    let shares = query.run(&state).await?;
    Ok(Json(SearchResponse {
        total: shares.len(),
        shares,
    }))
}
