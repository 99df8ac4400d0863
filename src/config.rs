//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub functions: FunctionsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "admin.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the dashboard
    ///
    /// # Returns
    /// Full URL like "https://admin.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Session token configuration
///
/// Tokens are minted by the identity provider, which shares the secret.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
}

/// Admin allow-list
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// User IDs granted dashboard access
    ///
    /// From the environment: `MOMENTDESK__ADMIN__UIDS=uid1,uid2`
    #[serde(default)]
    pub uids: Vec<String>,
}

/// How live listeners learn about changes
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LiveMode {
    /// Re-run queries when the store publishes a change
    #[default]
    ChangeFeed,
    /// Re-run queries on a fixed interval
    Polling,
}

/// Dashboard controller tuning
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Moments per page (default: 10)
    pub page_size: usize,
    /// Quiet period before a search keystroke is committed (default: 300)
    pub search_debounce_ms: u64,
    /// Upper bound for every backend call (default: 10000)
    pub backend_timeout_ms: u64,
    #[serde(default)]
    pub live_mode: LiveMode,
    /// Only used with `live_mode = "polling"` (default: 2000)
    pub poll_interval_ms: u64,
    /// Number of notices kept in the view (default: 20)
    pub notice_capacity: usize,
}

impl DashboardConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            search_debounce_ms: 300,
            backend_timeout_ms: 10_000,
            live_mode: LiveMode::ChangeFeed,
            poll_interval_ms: 2_000,
            notice_capacity: 20,
        }
    }
}

/// Privileged callable functions
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FunctionsConfig {
    /// Remote `banUser` callable URL
    ///
    /// When unset, the in-process ban function is used.
    pub ban_user_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (MOMENTDESK_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/momentdesk.db")?
            .set_default("admin.uids", Vec::<String>::new())?
            .set_default("dashboard.page_size", 10)?
            .set_default("dashboard.search_debounce_ms", 300)?
            .set_default("dashboard.backend_timeout_ms", 10000)?
            .set_default("dashboard.live_mode", "change_feed")?
            .set_default("dashboard.poll_interval_ms", 2000)?
            .set_default("dashboard.notice_capacity", 20)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (MOMENTDESK_*)
            .add_source(
                Environment::with_prefix("MOMENTDESK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("admin.uids")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.dashboard.page_size == 0 {
            return Err(crate::error::AppError::Config(
                "dashboard.page_size must be greater than 0".to_string(),
            ));
        }

        if self.dashboard.backend_timeout_ms == 0 {
            return Err(crate::error::AppError::Config(
                "dashboard.backend_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.dashboard.live_mode == LiveMode::Polling && self.dashboard.poll_interval_ms == 0 {
            return Err(crate::error::AppError::Config(
                "dashboard.poll_interval_ms must be greater than 0 in polling mode".to_string(),
            ));
        }

        if self.admin.uids.iter().all(|uid| uid.trim().is_empty()) {
            tracing::warn!("admin.uids is empty; every dashboard request will be denied");
        }

        if !self.server.protocol.eq_ignore_ascii_case("https")
            && !is_local_server_domain(&self.server.domain)
        {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/momentdesk-test.db"),
            },
            auth: AuthConfig {
                session_secret: "x".repeat(32),
            },
            admin: AdminConfig {
                uids: vec!["admin-uid".to_string()],
            },
            dashboard: DashboardConfig::default(),
            functions: FunctionsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_http_on_localhost() {
        let config = valid_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_accepts_http_on_loopback_address() {
        let mut config = valid_config();
        config.server.domain = "127.0.0.1:8080".to_string();
        assert!(config.validate().is_ok());

        config.server.domain = "admin.localhost".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_session_secret() {
        let mut config = valid_config();
        config.auth.session_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("session secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.session_secret")
        ));
    }

    #[test]
    fn validate_rejects_http_for_non_local_domain() {
        let mut config = valid_config();
        config.server.domain = "admin.example.com".to_string();
        config.server.protocol = "http".to_string();

        let error = config
            .validate()
            .expect_err("public domains must require https");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("server.protocol must be https")
        ));
    }

    #[test]
    fn validate_rejects_zero_page_size() {
        let mut config = valid_config();
        config.dashboard.page_size = 0;

        let error = config.validate().expect_err("page size 0 must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("dashboard.page_size")
        ));
    }

    #[test]
    fn validate_rejects_zero_backend_timeout() {
        let mut config = valid_config();
        config.dashboard.backend_timeout_ms = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn dashboard_defaults_match_reference_values() {
        let dashboard = DashboardConfig::default();
        assert_eq!(dashboard.page_size, 10);
        assert_eq!(dashboard.search_debounce(), Duration::from_millis(300));
        assert_eq!(dashboard.live_mode, LiveMode::ChangeFeed);
    }
}
