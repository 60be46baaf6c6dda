/// Configuration management for the befriends backend
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub pubsub: PubSubConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued session tokens
    pub token_ttl_days: i64,
    /// Lifetime of password reset tokens
    pub reset_token_ttl_minutes: i64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub authenticated_requests_per_minute: u32,
    pub anonymous_requests_per_minute: u32,
}

/// Publish/subscribe bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubConfig {
    /// Per-topic buffer; slower subscribers skip what falls out of it
    pub channel_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("BEFRIENDS_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("BEFRIENDS_PORT")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid port number".to_string()))?;
        let version = env::var("BEFRIENDS_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let database_path = env::var("BEFRIENDS_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/befriends.sqlite"));
        let max_connections = env::var("BEFRIENDS_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let jwt_secret = env::var("BEFRIENDS_JWT_SECRET")
            .map_err(|_| AppError::BadRequest("JWT secret required".to_string()))?;
        let token_ttl_days = env::var("BEFRIENDS_TOKEN_TTL_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .unwrap_or(7);
        let reset_token_ttl_minutes = env::var("BEFRIENDS_RESET_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let rate_limit_enabled = env::var("BEFRIENDS_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let authenticated_requests_per_minute =
            env::var("BEFRIENDS_RATE_LIMIT_AUTHENTICATED_PER_MINUTE")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap_or(600);
        let anonymous_requests_per_minute = env::var("BEFRIENDS_RATE_LIMIT_ANONYMOUS_PER_MINUTE")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .unwrap_or(120);

        let channel_capacity = env::var("BEFRIENDS_PUBSUB_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse()
            .unwrap_or(256);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "befriends=debug,tower_http=debug".to_string());
        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                database_path,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                token_ttl_days,
                reset_token_ttl_minutes,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                authenticated_requests_per_minute,
                anonymous_requests_per_minute,
            },
            pubsub: PubSubConfig { channel_capacity },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::BadRequest("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AppError::BadRequest(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.token_ttl_days <= 0 {
            return Err(AppError::BadRequest(
                "Token lifetime must be at least one day".to_string(),
            ));
        }

        if self.authentication.reset_token_ttl_minutes <= 0 {
            return Err(AppError::BadRequest(
                "Reset token lifetime must be positive".to_string(),
            ));
        }

        if self.pubsub.channel_capacity == 0 {
            return Err(AppError::BadRequest(
                "Pub/sub channel capacity must be positive".to_string(),
            ));
        }

        if self.rate_limit.enabled
            && (self.rate_limit.authenticated_requests_per_minute == 0
                || self.rate_limit.anonymous_requests_per_minute == 0)
        {
            return Err(AppError::BadRequest(
                "Rate limit quotas must be positive when rate limiting is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration for tests and embedded use
    pub fn for_testing() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                database_path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-that-is-at-least-32-characters-long".to_string(),
                token_ttl_days: 7,
                reset_token_ttl_minutes: 60,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                authenticated_requests_per_minute: 600,
                anonymous_requests_per_minute: 120,
            },
            pubsub: PubSubConfig {
                channel_capacity: 64,
            },
            logging: LoggingConfig {
                level: "befriends=debug".to_string(),
                json: false,
            },
        }
    }
}
