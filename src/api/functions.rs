//! Privileged callable functions
//!
//! Errors use the callable shape `{"error": {"code", "message"}}` so the
//! remote ban client can parse responses from this endpoint too.

use axum::{Json, Router, extract::State, routing::post};

use crate::AppState;
use crate::auth::MaybeUser;
use crate::backend::{BanRequest, BanResponse};
use crate::error::AppError;

/// Create functions router
///
/// Routes:
/// - POST /functions/ban_user - Ban a user and revoke their sessions
pub fn functions_router() -> Router<AppState> {
    Router::new().route("/ban_user", post(ban_user))
}

/// POST /functions/ban_user
///
/// The caller is resolved here; authorization happens inside the function.
async fn ban_user(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Json(request): Json<BanRequest>,
) -> Result<Json<BanResponse>, AppError> {
    let response = state.ban.ban_user(caller, request).await?;
    Ok(Json(response))
}
