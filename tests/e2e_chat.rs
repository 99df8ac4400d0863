//! E2E tests for the dashboard chat panel

mod common;

use chrono::Utc;
use common::{ADMIN_UID, TestServer, is_ready};
use momentdesk::data::ParticipantPair;

async fn open_chat(server: &TestServer, user_id: &str) -> reqwest::Response {
    server
        .client
        .post(server.url("/admin/chats"))
        .bearer_auth(server.admin_token())
        .json(&serde_json::json!({ "user_id": user_id }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_open_chat_creates_then_reuses() {
    let server = TestServer::new().await;
    server.create_user("member", Utc::now()).await;
    server.wait_for_dashboard(is_ready).await;

    let first: serde_json::Value = open_chat(&server, "member").await.json().await.unwrap();
    let second: serde_json::Value = open_chat(&server, "member").await.json().await.unwrap();

    assert_eq!(first["id"], second["id"]);
    let stored = server
        .state
        .db
        .find_chat(&ParticipantPair::new("member", ADMIN_UID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first["id"], stored.id.as_str());
}

#[tokio::test]
async fn test_send_message_shows_in_panel() {
    let server = TestServer::new().await;
    server.create_user("member", Utc::now()).await;
    server.wait_for_dashboard(is_ready).await;
    assert_eq!(open_chat(&server, "member").await.status(), 200);

    let response = server
        .client
        .post(server.url("/admin/chats/current/messages"))
        .bearer_auth(server.admin_token())
        .json(&serde_json::json!({ "text": "hello there" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let message: serde_json::Value = response.json().await.unwrap();
    assert_eq!(message["sender_id"], ADMIN_UID);
    assert_eq!(message["text"], "hello there");

    let view = server
        .wait_for_dashboard(|v| {
            v["chat"]["messages"]
                .as_array()
                .is_some_and(|messages| messages.len() == 1)
        })
        .await;
    assert_eq!(view["chat"]["target_id"], "member");
    assert_eq!(view["chat"]["messages"][0]["text"], "hello there");
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let server = TestServer::new().await;
    server.create_user("member", Utc::now()).await;
    server.wait_for_dashboard(is_ready).await;
    open_chat(&server, "member").await;

    let response = server
        .client
        .post(server.url("/admin/chats/current/messages"))
        .bearer_auth(server.admin_token())
        .json(&serde_json::json!({ "text": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_send_without_open_chat_is_rejected() {
    let server = TestServer::new().await;
    server.wait_for_dashboard(is_ready).await;

    let response = server
        .client
        .post(server.url("/admin/chats/current/messages"))
        .bearer_auth(server.admin_token())
        .json(&serde_json::json!({ "text": "hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_chat_with_self_is_rejected() {
    let server = TestServer::new().await;
    server.wait_for_dashboard(is_ready).await;

    let response = open_chat(&server, ADMIN_UID).await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_close_chat_clears_panel() {
    let server = TestServer::new().await;
    server.create_user("member", Utc::now()).await;
    server.wait_for_dashboard(is_ready).await;
    open_chat(&server, "member").await;

    let response = server
        .client
        .delete(server.url("/admin/chats/current"))
        .bearer_auth(server.admin_token())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 204);
    let view = server.dashboard().await;
    assert!(view["chat"].is_null());
}

#[tokio::test]
async fn test_list_chats_for_user() {
    let server = TestServer::new().await;
    server.create_user("member", Utc::now()).await;
    server.wait_for_dashboard(is_ready).await;
    let opened: serde_json::Value = open_chat(&server, "member").await.json().await.unwrap();

    let response = server
        .client
        .get(server.url("/admin/chats?user_id=member"))
        .bearer_auth(server.admin_token())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let chats: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["id"], opened["id"]);

    let empty: Vec<serde_json::Value> = server
        .client
        .get(server.url("/admin/chats?user_id=stranger"))
        .bearer_auth(server.admin_token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_chat_panel_shows_target_email() {
    let server = TestServer::new().await;
    server.create_user("member", Utc::now()).await;
    server
        .wait_for_dashboard(|v| {
            is_ready(v) && v["users"].as_array().is_some_and(|users| !users.is_empty())
        })
        .await;
    open_chat(&server, "member").await;

    let view = server.wait_for_dashboard(|v| !v["chat"].is_null()).await;
    assert_eq!(view["chat"]["target_name"], "member@example.com");
}
