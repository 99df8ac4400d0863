//! Admin dashboard endpoints
//!
//! Every route requires a session on the admin allow-list. Each admin
//! drives their own dashboard task; handlers forward to its handle.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use super::streaming::stream_dashboard;
use crate::AppState;
use crate::auth::AdminUser;
use crate::backend::call_with_timeout;
use crate::dashboard::{DashboardView, MutationOutcome, Preconfirmed};
use crate::data::{Chat, ChatMessage, Moment};
use crate::error::AppError;

/// Create admin router
///
/// Routes:
/// - GET /admin/dashboard - Current dashboard view
/// - GET /admin/dashboard/stream - View updates (SSE)
/// - POST /admin/dashboard/search - Search keystroke
/// - POST /admin/dashboard/page/next - Next page
/// - POST /admin/dashboard/page/previous - Previous page
/// - POST /admin/dashboard/count/refresh - Re-count moments
/// - GET /admin/dashboard/export.csv - Export the loaded page
/// - GET /admin/moments/:id - Moment details
/// - DELETE /admin/moments/:id - Delete moment
/// - POST /admin/users/:id/ban - Ban user
/// - GET /admin/chats?user_id= - Chats a user takes part in
/// - POST /admin/chats - Open chat panel
/// - DELETE /admin/chats/current - Close chat panel
/// - POST /admin/chats/current/messages - Send message
/// - DELETE /admin/session - Sign out of the dashboard
pub fn admin_router() -> Router<AppState> {
    Router::new()
        // Dashboard
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/stream", get(stream_dashboard))
        .route("/dashboard/search", post(search))
        .route("/dashboard/page/next", post(next_page))
        .route("/dashboard/page/previous", post(previous_page))
        .route("/dashboard/count/refresh", post(refresh_count))
        .route("/dashboard/export.csv", get(export_csv))
        // Mutations
        .route("/moments/:id", get(get_moment).delete(delete_moment))
        .route("/users/:id/ban", post(ban_user))
        // Chat
        .route("/chats", get(list_chats).post(open_chat))
        .route("/chats/current", delete(close_chat))
        .route("/chats/current/messages", post(send_message))
        // Session
        .route("/session", delete(sign_out))
}

// =============================================================================
// Dashboard
// =============================================================================

/// GET /admin/dashboard
async fn get_dashboard(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
) -> Json<DashboardView> {
    let handle = state.registry.get_or_start(&session).await;
    Json(handle.view())
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
}

/// POST /admin/dashboard/search
///
/// Accepted immediately; the query is committed after the quiet period.
async fn search(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    Json(req): Json<SearchRequest>,
) -> Result<StatusCode, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    handle.search_input(req.query).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /admin/dashboard/page/next
async fn next_page(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
) -> Result<Json<DashboardView>, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    handle.next_page().await?;
    Ok(Json(handle.view()))
}

/// POST /admin/dashboard/page/previous
async fn previous_page(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
) -> Result<Json<DashboardView>, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    handle.previous_page().await?;
    Ok(Json(handle.view()))
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: u64,
}

/// POST /admin/dashboard/count/refresh
async fn refresh_count(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
) -> Result<Json<CountResponse>, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    let count = handle.refresh_count().await?;
    Ok(Json(CountResponse { count }))
}

/// GET /admin/dashboard/export.csv
async fn export_csv(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
) -> Result<Response, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    let export = handle.export_csv();
    let body = export.to_csv()?;
    tracing::info!(uid = %session.uid, rows = export.len(), "CSV export generated");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        body,
    )
        .into_response())
}

// =============================================================================
// Moments and users
// =============================================================================

/// GET /admin/moments/:id
async fn get_moment(
    State(state): State<AppState>,
    AdminUser(_session): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Moment>, AppError> {
    let limit = state.config.dashboard.backend_timeout();
    call_with_timeout("get_moment", limit, state.store.get_moment(&id))
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
struct ConfirmParams {
    #[serde(default)]
    confirm: bool,
}

fn outcome_response(outcome: MutationOutcome) -> Response {
    let status = match outcome {
        MutationOutcome::Completed { .. } => StatusCode::OK,
        MutationOutcome::Declined => StatusCode::OK,
        MutationOutcome::AlreadyInProgress => StatusCode::CONFLICT,
    };
    (status, Json(outcome)).into_response()
}

/// DELETE /admin/moments/:id?confirm=true
///
/// Without `confirm=true` the request is treated as a declined prompt.
async fn delete_moment(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    Path(id): Path<String>,
    Query(params): Query<ConfirmParams>,
) -> Result<Response, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    let outcome = handle
        .delete_moment(id, &Preconfirmed(params.confirm))
        .await?;
    Ok(outcome_response(outcome))
}

/// POST /admin/users/:id/ban?confirm=true
async fn ban_user(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    Path(id): Path<String>,
    Query(params): Query<ConfirmParams>,
) -> Result<Response, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    let outcome = handle.ban_user(id, &Preconfirmed(params.confirm)).await?;
    Ok(outcome_response(outcome))
}

// =============================================================================
// Chat
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListChatsParams {
    /// Defaults to the signed-in admin
    user_id: Option<String>,
}

/// GET /admin/chats?user_id=
async fn list_chats(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    Query(params): Query<ListChatsParams>,
) -> Result<Json<Vec<Chat>>, AppError> {
    let user_id = params
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or(session.uid);
    let limit = state.config.dashboard.backend_timeout();
    let chats = call_with_timeout("list_chats", limit, state.store.list_chats(&user_id)).await?;
    Ok(Json(chats))
}

#[derive(Debug, Deserialize)]
struct OpenChatRequest {
    user_id: String,
}

/// POST /admin/chats
async fn open_chat(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    Json(req): Json<OpenChatRequest>,
) -> Result<Json<Chat>, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    Ok(Json(handle.open_chat(req.user_id).await?))
}

/// DELETE /admin/chats/current
async fn close_chat(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
) -> Result<StatusCode, AppError> {
    let handle = state.registry.get_or_start(&session).await;
    handle.close_chat().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    text: String,
}

/// POST /admin/chats/current/messages
async fn send_message(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let handle = state.registry.get_or_start(&session).await;
    let message = handle.send_message(req.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// =============================================================================
// Session
// =============================================================================

/// DELETE /admin/session
async fn sign_out(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
) -> StatusCode {
    state.registry.sign_out(&session.uid).await;
    StatusCode::NO_CONTENT
}
