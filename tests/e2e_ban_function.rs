//! E2E tests for the privileged ban function and the dashboard ban action

mod common;

use chrono::Utc;
use common::{ADMIN_UID, TestServer, is_ready};

#[tokio::test]
async fn test_ban_function_requires_authentication() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/functions/ban_user"))
        .json(&serde_json::json!({ "userId": "target" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthenticated");
    assert_eq!(
        body["error"]["message"],
        "The function must be called while authenticated."
    );
}

#[tokio::test]
async fn test_ban_function_requires_admin_claim() {
    let server = TestServer::new().await;
    server.create_user("target", Utc::now()).await;

    let response = server
        .client
        .post(server.url("/functions/ban_user"))
        .bearer_auth(server.token_for("regular-user", false))
        .json(&serde_json::json!({ "userId": "target" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "permission-denied");
    assert!(!server.state.db.get_user("target").await.unwrap().unwrap().is_banned);
}

#[tokio::test]
async fn test_ban_function_requires_user_id() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/functions/ban_user"))
        .bearer_auth(server.admin_token())
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid-argument");
    assert_eq!(body["error"]["message"], "The `userId` is required.");
}

#[tokio::test]
async fn test_ban_function_unknown_user() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/functions/ban_user"))
        .bearer_auth(server.admin_token())
        .json(&serde_json::json!({ "userId": "ghost" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not-found");
    assert_eq!(body["error"]["message"], "User not found.");
}

#[tokio::test]
async fn test_ban_function_bans_and_revokes_sessions() {
    let server = TestServer::new().await;
    server.create_user("target", Utc::now()).await;
    server
        .state
        .db
        .record_sign_in("target", Utc::now())
        .await
        .unwrap();

    let response = server
        .client
        .post(server.url("/functions/ban_user"))
        .bearer_auth(server.admin_token())
        .json(&serde_json::json!({ "userId": "target" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["message"],
        "User target banned and logged out successfully."
    );

    let user = server.state.db.get_user("target").await.unwrap().unwrap();
    assert!(user.is_banned);
    assert!(user.disabled);
    assert_eq!(user.banned_by.as_deref(), Some(ADMIN_UID));
    assert_eq!(
        server.state.db.count_active_sessions("target").await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_dashboard_ban_requires_confirmation() {
    let server = TestServer::new().await;
    server.create_user("target", Utc::now()).await;
    server.wait_for_dashboard(is_ready).await;

    let response = server
        .client
        .post(server.url("/admin/users/target/ban"))
        .bearer_auth(server.admin_token())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "declined");
    assert!(!server.state.db.get_user("target").await.unwrap().unwrap().is_banned);
}

#[tokio::test]
async fn test_dashboard_ban_surfaces_function_message() {
    let server = TestServer::new().await;
    server.create_user("target", Utc::now()).await;
    server.wait_for_dashboard(is_ready).await;

    let response = server
        .client
        .post(server.url("/admin/users/target/ban?confirm=true"))
        .bearer_auth(server.admin_token())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "completed");
    assert_eq!(
        body["message"],
        "User target banned and logged out successfully."
    );

    // The users listener picks up the banned flag
    let view = server
        .wait_for_dashboard(|v| {
            v["users"]
                .as_array()
                .unwrap()
                .iter()
                .any(|u| u["id"] == "target" && u["is_banned"] == true)
        })
        .await;
    assert!(
        view["notices"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["level"] == "success")
    );
}

#[tokio::test]
async fn test_dashboard_ban_failure_becomes_notice() {
    let server = TestServer::new().await;
    server.wait_for_dashboard(is_ready).await;

    let response = server
        .client
        .post(server.url("/admin/users/ghost/ban?confirm=true"))
        .bearer_auth(server.admin_token())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);

    let view = server.dashboard().await;
    assert!(
        view["notices"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["level"] == "error" && n["message"] == "Error banning user: User not found.")
    );
}
