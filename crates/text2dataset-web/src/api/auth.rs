use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::SignedCookieJar;
use serde::Deserialize;
use text2dataset_core::{Error, Registration, User};

use crate::error::AppResult;
use crate::session::{removal_cookie, session_cookie, session_id};
use crate::state::AppState;
use crate::templates::{render, LoginTemplate, SignupTemplate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/signup", get(signup_page).post(signup))
        .route("/logout", get(logout))
}

async fn login_page() -> AppResult<Html<String>> {
    render(&LoginTemplate::new(None))
}

async fn signup_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    render(&SignupTemplate::new(None, state.config.password_min_length))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let username = form.username.trim();
    let user = state.store.get_user(username).await?;

    let user = match user {
        Some(user) if user.check_password(&form.password) => user,
        _ => {
            tracing::debug!(username, "Rejected login");
            let page = render(&LoginTemplate::new(Some("Invalid username or password")))?;
            return Ok((StatusCode::UNAUTHORIZED, page).into_response());
        }
    };
    if user.banned {
        let page = render(&LoginTemplate::new(Some("This account has been banned")))?;
        return Ok((StatusCode::FORBIDDEN, page).into_response());
    }

    let id = state.sessions.write().await.create(user.username.clone());
    tracing::info!(username = %user.username, "User logged in");
    Ok((jar.add(session_cookie(id)), Redirect::to("/")).into_response())
}

async fn signup(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(mut form): Form<Registration>,
) -> AppResult<Response> {
    form.username = form.username.trim().to_string();
    let min_len = state.config.password_min_length;

    let rejected = |status: StatusCode, message: &str| -> AppResult<Response> {
        let page = render(&SignupTemplate::new(Some(message), min_len))?;
        Ok((status, page).into_response())
    };

    if let Err(e) = form.validate(min_len) {
        let message = match e {
            Error::Validation(message) => message,
            other => other.to_string(),
        };
        return rejected(StatusCode::BAD_REQUEST, &message);
    }

    let is_admin = form.username == state.config.admin_username;
    let user = User::new(form.username, &form.password, is_admin);
    match state.store.create_user(&user).await {
        Ok(()) => {}
        Err(Error::DuplicateUser(_)) => {
            return rejected(StatusCode::CONFLICT, "Username already exists");
        }
        Err(e) => return Err(e.into()),
    }

    let id = state.sessions.write().await.create(user.username.clone());
    tracing::info!(username = %user.username, is_admin, "User registered");
    Ok((jar.add(session_cookie(id)), Redirect::to("/")).into_response())
}

async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> impl IntoResponse {
    if let Some(id) = session_id(&jar) {
        if let Some(session) = state.sessions.write().await.remove(id) {
            tracing::info!(username = %session.username, "User logged out");
        }
    }
    (jar.remove(removal_cookie()), Redirect::to("/"))
}
