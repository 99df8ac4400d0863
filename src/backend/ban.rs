//! Privileged `banUser` callable
//!
//! Input `{ "userId": ... }`, output `{ "success": true, "message": ... }`.
//! Failures are structured [`AppError::Callable`] errors.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::auth::AuthSession;
use crate::data::Database;
use crate::error::{AppError, CallableCode, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

impl BanRequest {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanResponse {
    pub success: bool,
    pub message: String,
}

/// Disable an account, revoke its sessions and mark it banned
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BanOperation: Send + Sync {
    async fn ban_user(&self, caller: Option<AuthSession>, request: BanRequest) -> Result<BanResponse>;
}

/// Runs the ban against the local database
pub struct LocalBanFunction {
    db: Arc<Database>,
}

impl LocalBanFunction {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BanOperation for LocalBanFunction {
    async fn ban_user(&self, caller: Option<AuthSession>, request: BanRequest) -> Result<BanResponse> {
        let caller = caller.ok_or_else(|| {
            AppError::callable(
                CallableCode::Unauthenticated,
                "The function must be called while authenticated.",
            )
        })?;

        if !caller.admin {
            return Err(AppError::callable(
                CallableCode::PermissionDenied,
                "Only administrators can perform this action.",
            ));
        }

        let user_id = request
            .user_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::callable(CallableCode::InvalidArgument, "The `userId` is required.")
            })?;

        match self.db.ban_user(&user_id, &caller.uid).await {
            Ok(_) => {
                tracing::info!(user_id = %user_id, admin = %caller.uid, "User banned by admin");
                Ok(BanResponse {
                    success: true,
                    message: format!("User {user_id} banned and logged out successfully."),
                })
            }
            Err(AppError::NotFound) => Err(AppError::callable(
                CallableCode::NotFound,
                "User not found.",
            )),
            Err(error) => {
                tracing::error!(user_id = %user_id, error = %error, "Error banning user");
                Err(AppError::callable(
                    CallableCode::Internal,
                    format!("Failed to ban user: {error}"),
                ))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: RemoteError,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    code: CallableCode,
    message: String,
}

/// Calls a remote `banUser` endpoint speaking the same JSON contract
pub struct RemoteBanFunction {
    client: reqwest::Client,
    url: String,
}

impl RemoteBanFunction {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl BanOperation for RemoteBanFunction {
    async fn ban_user(&self, caller: Option<AuthSession>, request: BanRequest) -> Result<BanResponse> {
        let token = caller.and_then(|session| session.token).ok_or_else(|| {
            AppError::callable(
                CallableCode::Unauthenticated,
                "The function must be called while authenticated.",
            )
        })?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<BanResponse>().await?);
        }

        let body = response.text().await?;
        match serde_json::from_str::<RemoteErrorBody>(&body) {
            Ok(RemoteErrorBody { error }) => Err(AppError::callable(error.code, error.message)),
            Err(_) => Err(AppError::callable(
                CallableCode::Internal,
                format!("Failed to ban user: remote function returned {status}"),
            )),
        }
    }
}

/// Build the configured ban operation
pub fn ban_operation(
    config: &crate::config::FunctionsConfig,
    db: Arc<Database>,
) -> Arc<dyn BanOperation> {
    match &config.ban_user_url {
        Some(url) => {
            tracing::info!(url = %url, "Using remote ban function");
            Arc::new(RemoteBanFunction::new(reqwest::Client::new(), url.clone()))
        }
        None => Arc::new(LocalBanFunction::new(db)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::User;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn setup() -> (LocalBanFunction, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::connect(&temp_dir.path().join("ban.db")).await.unwrap());
        db.upsert_user(&User::new("target", "target@example.com", Utc::now()))
            .await
            .unwrap();
        (LocalBanFunction::new(db.clone()), db, temp_dir)
    }

    fn caller(admin: bool) -> Option<AuthSession> {
        Some(AuthSession {
            uid: "admin-1".to_string(),
            email: Some("admin@example.com".to_string()),
            admin,
            token: None,
            expires_at: None,
        })
    }

    fn code_of(result: Result<BanResponse>) -> CallableCode {
        match result {
            Err(AppError::Callable { code, .. }) => code,
            other => panic!("expected callable error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bans_user_and_reports_message() {
        let (function, db, _temp_dir) = setup().await;

        let response = function
            .ban_user(caller(true), BanRequest::for_user("target"))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.message, "User target banned and logged out successfully.");
        let user = db.get_user("target").await.unwrap().unwrap();
        assert!(user.is_banned);
        assert_eq!(user.banned_by.as_deref(), Some("admin-1"));
    }

    #[tokio::test]
    async fn rejects_anonymous_and_non_admin_callers() {
        let (function, _db, _temp_dir) = setup().await;

        let anonymous = function.ban_user(None, BanRequest::for_user("target")).await;
        assert_eq!(code_of(anonymous), CallableCode::Unauthenticated);

        let non_admin = function
            .ban_user(caller(false), BanRequest::for_user("target"))
            .await;
        assert_eq!(code_of(non_admin), CallableCode::PermissionDenied);
    }

    #[tokio::test]
    async fn requires_user_id() {
        let (function, _db, _temp_dir) = setup().await;
        let result = function.ban_user(caller(true), BanRequest::default()).await;
        assert_eq!(code_of(result), CallableCode::InvalidArgument);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (function, _db, _temp_dir) = setup().await;
        let result = function
            .ban_user(caller(true), BanRequest::for_user("ghost"))
            .await;
        assert_eq!(code_of(result), CallableCode::NotFound);
    }
}
