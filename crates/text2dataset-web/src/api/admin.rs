use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::post,
    Form, Router,
};
use serde::Deserialize;
use text2dataset_core::Error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::session::RequireAdmin;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/delete_dataset/{dataset_id}", post(delete_dataset))
        .route("/admin/ban_user", post(ban_user))
}

async fn delete_dataset(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(dataset_id): Path<Uuid>,
) -> AppResult<Redirect> {
    let dataset = state.store.get_dataset(dataset_id).await?;
    state.store.delete_dataset(dataset_id).await?;
    let removed = state.outputs.remove(&dataset.filename).await?;

    tracing::info!(%dataset_id, admin = %admin.username, file_removed = removed, "Dataset deleted");
    Ok(Redirect::to("/history"))
}

#[derive(Debug, Deserialize)]
pub struct BanForm {
    pub username: String,
}

async fn ban_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<BanForm>,
) -> AppResult<Redirect> {
    let username = form.username.trim();
    let user = state
        .store
        .get_user(username)
        .await?
        .ok_or_else(|| Error::UserNotFound(username.to_string()))?;
    if user.is_admin {
        return Err(AppError::Forbidden("Administrators cannot be banned".into()));
    }

    state.store.set_banned(username, true).await?;
    let ended = state.sessions.write().await.remove_user(username);

    tracing::info!(username, admin = %admin.username, sessions_ended = ended, "User banned");
    Ok(Redirect::to("/community"))
}
