//! Momentdesk - Admin dashboard service for a social moments application
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Admin dashboard endpoints + SSE view stream              │
//! │  - Privileged callable functions (banUser)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Dashboard Controllers                      │
//! │  - One task per signed-in admin                             │
//! │  - Cursor pager, search debouncer, aggregate counter        │
//! │  - Generation-tagged live listeners                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Backend Interfaces                        │
//! │  - Record store, live queries, auth, ban operation          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx) + in-process change feed                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `dashboard`: Dashboard controller and its parts
//! - `backend`: Traits the controller is written against
//! - `data`: Database layer
//! - `auth`: Session tokens and extractors
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Record store used by handlers that read outside a dashboard
    pub store: Arc<dyn backend::RecordStore>,

    /// Running dashboards, keyed by admin uid
    pub registry: Arc<dashboard::DashboardRegistry>,

    /// Privileged ban function (local or remote)
    pub ban: Arc<dyn backend::BanOperation>,

    /// Users allowed on the dashboard
    pub admins: backend::AdminAllowList,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the ban operation
    /// 3. Build the dashboard registry
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        let admins = backend::AdminAllowList::new(config.admin.uids.iter());
        if admins.is_empty() {
            tracing::warn!("Admin allow-list is empty; nobody can open the dashboard");
        }

        let ban = backend::ban_operation(&config.functions, db.clone());
        let store: Arc<dyn backend::RecordStore> = db.clone();
        let registry = Arc::new(dashboard::DashboardRegistry::new(
            store.clone(),
            ban.clone(),
            admins.clone(),
            config.dashboard.clone(),
        ));

        tracing::info!(
            admins = admins.len(),
            live_mode = ?config.dashboard.live_mode,
            "Application state initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            store,
            registry,
            ban,
            admins,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/admin", api::admin_router())
        .nest("/functions", api::functions_router())
        .layer(axum::middleware::from_fn(api::metrics::track_requests))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
