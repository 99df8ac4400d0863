//! Authentication extractors
//!
//! Tokens come from the `Authorization: Bearer` header or the `session` cookie.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::session::verify_session_token;
use crate::AppState;
use crate::backend::{AuthSession, check_access};
use crate::error::AppError;

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get("session").map(|cookie| cookie.value().to_owned())
        })
}

fn authenticate(parts: &mut Parts, state: &AppState) -> Result<AuthSession, AppError> {
    if let Some(session) = parts.extensions.get::<AuthSession>().cloned() {
        return Ok(session);
    }

    let token = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
    let session = verify_session_token(&token, &state.config.auth.session_secret)?;
    let session = AuthSession::from_session(&session, Some(token));
    parts.extensions.insert(session.clone());

    Ok(session)
}

/// Optional current user extractor
///
/// Returns None if not authenticated, instead of error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthSession>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(MaybeUser(authenticate(parts, &state).ok()))
    }
}

/// Signed-in user on the admin allow-list
///
/// Rejects with 401 when not signed in and 403 when not an admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthSession);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let session = authenticate(parts, &state)?;
        if let Err(error) = check_access(Some(&session), &state.admins) {
            tracing::warn!(uid = %session.uid, "Dashboard access denied");
            return Err(error);
        }
        Ok(AdminUser(session))
    }
}
