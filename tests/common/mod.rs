//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use momentdesk::data::{Moment, NewMoment, User};
use momentdesk::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Allow-listed admin used by the tests
pub const ADMIN_UID: &str = "admin-1";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "admin.test.example.com".to_string(),
                protocol: "https".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            },
            admin: config::AdminConfig {
                uids: vec![ADMIN_UID.to_string()],
            },
            dashboard: config::DashboardConfig {
                search_debounce_ms: 50,
                backend_timeout_ms: 5_000,
                ..config::DashboardConfig::default()
            },
            functions: config::FunctionsConfig::default(),
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = momentdesk::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Signed session token for `uid`
    pub fn token_for(&self, uid: &str, admin: bool) -> String {
        use momentdesk::auth::session::{Session, create_session_token};

        let session = Session::new(uid, Some(format!("{uid}@example.com")), admin, 3600);
        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Token for the allow-listed admin, carrying the admin claim
    pub fn admin_token(&self) -> String {
        self.token_for(ADMIN_UID, true)
    }

    /// Create a user in the database
    pub async fn create_user(&self, id: &str, created_at: DateTime<Utc>) -> User {
        let user = User::new(id, format!("{id}@example.com"), created_at);
        self.state.db.upsert_user(&user).await.unwrap();
        user
    }

    /// Create a moment in the database
    pub async fn create_moment(
        &self,
        user_id: &str,
        caption: &str,
        created_at: DateTime<Utc>,
    ) -> Moment {
        self.state
            .db
            .insert_moment(NewMoment {
                caption: Some(caption.to_string()),
                user_id: user_id.to_string(),
                image_url: None,
                created_at,
            })
            .await
            .unwrap()
    }

    /// GET the admin's dashboard view as JSON
    pub async fn dashboard(&self) -> serde_json::Value {
        self.client
            .get(self.url("/admin/dashboard"))
            .bearer_auth(self.admin_token())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Poll the dashboard view until `predicate` holds
    pub async fn wait_for_dashboard<F>(&self, predicate: F) -> serde_json::Value
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        for _ in 0..100 {
            let view = self.dashboard().await;
            if predicate(&view) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("dashboard never reached the expected state");
    }
}

/// Dashboard has loaded its first snapshot
pub fn is_ready(view: &serde_json::Value) -> bool {
    view["status"] == "ready" && view["moments_loading"] == false
}
