//! Process configuration for Rideway
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).
//! Business parameters (fares, commission, feature toggles) live in
//! [`crate::app_config`] instead, since admins edit them at runtime.

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Which store implementation backs the services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid storage backend: '{}'. Expected: postgres or memory",
                s
            ))),
        }
    }
}

/// Read a numeric setting, falling back to `default` when unset
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(format!("{} is not a valid number: '{}'", name, raw))
        }),
        _ => Ok(default),
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Store implementation
    pub storage_backend: StorageBackend,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Rate limit: requests per second per IP
    pub rate_limit_rps: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Shared secret used to verify identity tokens
    pub jwt_secret: String,

    /// Multicast push gateway endpoint; pushes are only logged when unset
    pub push_gateway_url: Option<String>,

    /// Server key sent to the push gateway
    pub push_gateway_key: Option<String>,

    /// A driver position older than this is considered stale
    pub location_stale_after_seconds: i64,

    /// How often the stale-location sweeper runs
    pub location_sweep_interval_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let storage_backend = env::var("STORAGE_BACKEND")
            .map(|s| StorageBackend::parse(&s))
            .unwrap_or(Ok(StorageBackend::Postgres))?;

        let database_url = match storage_backend {
            StorageBackend::Postgres => env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?,
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = env_or("DB_MAX_CONNECTIONS", 5u32)?;
        let rate_limit_rps = env_or("RATE_LIMIT_RPS", 100u32)?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "development-secret-change-in-production".to_string());

        if environment.is_production() && jwt_secret.starts_with("development-") {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let push_gateway_url = env::var("PUSH_GATEWAY_URL").ok().filter(|s| !s.is_empty());
        let push_gateway_key = env::var("PUSH_GATEWAY_KEY").ok().filter(|s| !s.is_empty());

        let location_stale_after_seconds = env_or("LOCATION_STALE_AFTER_SECONDS", 120i64)?;
        let location_sweep_interval_seconds = env_or("LOCATION_SWEEP_INTERVAL_SECONDS", 30u64)?;

        Ok(Config {
            database_url,
            storage_backend,
            environment,
            port,
            db_max_connections,
            rate_limit_rps,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            push_gateway_url,
            push_gateway_key,
            location_stale_after_seconds,
            location_sweep_interval_seconds,
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}
