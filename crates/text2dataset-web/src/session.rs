use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::{
    cookie::{Cookie, Key, SameSite},
    SignedCookieJar,
};
use text2dataset_core::User;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, SessionId};

pub const SESSION_COOKIE_NAME: &str = "t2d_session";

/// The logged-in user, if any. Banned users are still returned here.
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        let Some(session_id) = session_id(&jar) else {
            return Ok(Self(None));
        };

        let username = state.sessions.write().await.resolve(session_id);
        let Some(username) = username else {
            return Ok(Self(None));
        };

        Ok(Self(state.store.get_user(&username).await?))
    }
}

/// A logged-in user that is not banned
pub struct RequireUser(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        let user = user.ok_or(AppError::Unauthorized)?;
        if user.banned {
            return Err(AppError::Forbidden("This account has been banned".into()));
        }
        Ok(Self(user))
    }
}

/// A logged-in administrator
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(Self(user))
    }
}

/// Session id carried by a verified cookie
pub fn session_id(jar: &SignedCookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE_NAME)
        .and_then(|cookie| cookie.value().parse::<Uuid>().ok())
}

/// Cookie to set on response after login
pub fn session_cookie(session_id: SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that clears the session on logout
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE_NAME).path("/").build()
}
