//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with BAZAAR_, sections split by `__`,
//!    e.g. `BAZAAR_AUTH__JWT_SECRET`)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the database URI and the JWT secret should be kept in
//! environment variables, not in the config file.

use crate::constants;
use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind: String,
    /// Worker count, 0 lets actix pick one per core
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            workers: 0,
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Backend: "mongo" or "memory"
    pub backend: String,
    /// Connection string (should be in env var BAZAAR_DATABASE__URI)
    pub uri: String,
    /// Database name
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: "mongo".to_string(),
            uri: "mongodb://localhost:27017".to_string(),
            name: "bazaar".to_string(),
        }
    }
}

/// Bearer token verification
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret (should be in env var BAZAAR_AUTH__JWT_SECRET)
    pub jwt_secret: String,
    /// Expected `iss` claim, unchecked when empty
    pub issuer: String,
}

/// Default and maximum page size for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLimits {
    pub default: i64,
    pub max: i64,
}

impl PageLimits {
    pub const fn new(default: i64, max: i64) -> Self {
        Self { default, max }
    }
}

/// Per-resource pagination table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub users: PageLimits,
    pub categories: PageLimits,
    pub tags: PageLimits,
    pub titles: PageLimits,
    pub products: PageLimits,
    pub reviews: PageLimits,
    pub latest_reviews: PageLimits,
    pub suggestions: PageLimits,
    pub images: PageLimits,
    pub cross_search: PageLimits,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            users: PageLimits::new(100, 100),
            categories: PageLimits::new(1000, 1000),
            tags: PageLimits::new(100, 100),
            titles: PageLimits::new(100, 100),
            products: PageLimits::new(100, 1000),
            reviews: PageLimits::new(100, 100),
            latest_reviews: PageLimits::new(
                constants::LATEST_REVIEWS_LIMIT,
                constants::LATEST_REVIEWS_LIMIT,
            ),
            suggestions: PageLimits::new(1000, 1000),
            images: PageLimits::new(25, 25),
            cross_search: PageLimits::new(20, 100),
        }
    }
}

/// Soft-delete retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Minimum age in days before a soft-deleted user may be pruned
    pub user_days: i64,
    /// Minimum age in days before a soft-deleted product may be pruned
    pub product_days: i64,
    /// Seconds between scheduled sweeps, 0 disables the timer
    pub prune_interval_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            user_days: constants::USER_RETENTION_DAYS,
            product_days: constants::PRODUCT_RETENTION_DAYS,
            prune_interval_seconds: constants::PRUNE_INTERVAL_SECONDS,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Search requests per window
    pub search_max_requests: u32,
    /// Search rate limit window in seconds
    pub search_window_seconds: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            search_max_requests: 30,
            search_window_seconds: 60,
        }
    }
}

/// Image upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_image_bytes: usize,
    pub allowed_image_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: constants::MAX_IMAGE_BYTES,
            allowed_image_types: constants::ALLOWED_IMAGE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
    pub retention: RetentionConfig,
    pub rate_limit: RateLimitConfig,
    pub uploads: UploadConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g., BAZAAR_DATABASE__URI, BAZAAR_RETENTION__USER_DAYS
            .add_source(
                Environment::with_prefix("BAZAAR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Initialize application configuration
///
/// This triggers the lazy loading of the config file and logs the result.
/// Should be called early in application startup.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: database.backend = {}, server.bind = {}",
        config.database.backend,
        config.server.bind
    );
}

// Convenience functions for accessing global config

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

/// Get the pagination table
pub fn pagination() -> PaginationConfig {
    get_config().pagination
}

/// Get retention configuration
pub fn retention() -> RetentionConfig {
    get_config().retention
}

/// Get rate limit configuration
pub fn rate_limit() -> RateLimitConfig {
    get_config().rate_limit
}

pub fn uploads() -> UploadConfig {
    get_config().uploads
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.backend, "mongo");
        assert_eq!(config.retention.user_days, 730);
        assert_eq!(config.retention.product_days, 365);
        assert_eq!(config.rate_limit.search_max_requests, 30);
    }

    #[test]
    fn test_pagination_defaults_are_per_resource() {
        let pagination = PaginationConfig::default();
        assert_eq!(pagination.products, PageLimits::new(100, 1000));
        assert_eq!(pagination.categories, PageLimits::new(1000, 1000));
        assert_eq!(pagination.images, PageLimits::new(25, 25));
        assert_eq!(pagination.cross_search, PageLimits::new(20, 100));
        assert_eq!(pagination.latest_reviews, PageLimits::new(25, 25));
    }

    #[test]
    fn test_jwt_secret_empty_by_default() {
        let config = AppConfig::default();
        assert!(config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
bind = "127.0.0.1:9000"

[database]
backend = "memory"

[retention]
user_days = 30
prune_interval_seconds = 0

[pagination.products]
default = 10
max = 50
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.database.backend, "memory");
        assert_eq!(config.retention.user_days, 30);
        assert_eq!(config.retention.prune_interval_seconds, 0);
        assert_eq!(config.pagination.products, PageLimits::new(10, 50));
        // Defaults should still apply for unspecified values
        assert_eq!(config.retention.product_days, 365);
        assert_eq!(config.pagination.tags, PageLimits::new(100, 100));
        assert_eq!(config.database.name, "bazaar");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.database.backend, "mongo");
        assert_eq!(config.pagination.suggestions, PageLimits::new(1000, 1000));
    }
}
