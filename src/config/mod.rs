//! Configuration management for casegate
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables. The resulting [`Config`] is built
//! once at startup and its sections are handed to the components that need them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Minimum accepted length of the token signing secret
pub const MIN_SECRET_LENGTH: usize = 32;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token and session configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Shared cache configuration (sessions and rate counters)
    #[serde(default)]
    pub cache: CacheConfig,

    /// Request throttling rules
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix CASEGATE_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("CASEGATE_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("CASEGATE_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }
        if let Ok(trust) = std::env::var("CASEGATE_TRUST_PROXY") {
            config.server.trust_proxy = trust.parse().unwrap_or(false);
        }

        if let Ok(secret) = std::env::var("CASEGATE_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Ok(url) = std::env::var("CASEGATE_CLIENT_URL") {
            config.auth.client_url = url;
        }

        if let Ok(backend) = std::env::var("CASEGATE_CACHE_BACKEND") {
            config.cache.backend = backend;
        }
        if let Ok(url) = std::env::var("CASEGATE_REDIS_URL") {
            config.cache.redis.url = url;
        }

        if let Ok(path) = std::env::var("CASEGATE_DATABASE_PATH") {
            config.database.path = path;
        }

        if let Ok(enabled) = std::env::var("CASEGATE_OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Ok(endpoint) = std::env::var("CASEGATE_OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("CASEGATE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("CASEGATE_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check cross-field invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.auth.jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "auth.jwt_secret must be at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.auth.remember_me_ttl_secs < self.auth.token_ttl_secs {
            return Err(ConfigError::InvalidValue(
                "auth.remember_me_ttl_secs must not be shorter than auth.token_ttl_secs"
                    .to_string(),
            ));
        }

        match self.cache.backend.as_str() {
            "redis" | "memory" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "unknown cache backend: {}",
                    other
                )))
            }
        }

        for (name, rule) in [
            ("general", &self.rate_limit.general),
            ("auth", &self.rate_limit.auth),
        ] {
            if rule.window_secs == 0 || rule.max_requests == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "rate_limit.{} needs a positive window and request budget",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Take the client address from `X-Forwarded-For` when behind a proxy
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_proxy: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Token and session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC secret used to sign bearer and verification tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Lifetime of a normal login token (and its session)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Lifetime of a "remember me" login token (and its session)
    #[serde(default = "default_remember_me_ttl")]
    pub remember_me_ttl_secs: u64,

    /// Lifetime of the email verification token
    #[serde(default = "default_verification_ttl")]
    pub verification_ttl_secs: u64,

    /// Base URL of the frontend, used to build verification links
    #[serde(default = "default_client_url")]
    pub client_url: String,
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn remember_me_ttl(&self) -> Duration {
        Duration::from_secs(self.remember_me_ttl_secs)
    }

    pub fn verification_ttl(&self) -> Duration {
        Duration::from_secs(self.verification_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl(),
            remember_me_ttl_secs: default_remember_me_ttl(),
            verification_ttl_secs: default_verification_ttl(),
            client_url: default_client_url(),
        }
    }
}

fn default_token_ttl() -> u64 {
    86400 // 24 hours
}

fn default_remember_me_ttl() -> u64 {
    2_592_000 // 30 days
}

fn default_verification_ttl() -> u64 {
    86400
}

fn default_client_url() -> String {
    "http://localhost:3000".to_string()
}

/// Shared cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Backend to use: "redis" or "memory"
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Redis connection settings
    #[serde(default)]
    pub redis: RedisConfig,

    /// Upper bound for a single cache round trip
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl CacheConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis: RedisConfig::default(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

fn default_cache_backend() -> String {
    "redis".to_string()
}

fn default_operation_timeout_ms() -> u64 {
    2000
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Maximum pooled connections
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_redis_pool_size() -> usize {
    16
}

/// Named request throttling rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitSettings {
    /// Whether throttling is applied at all
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,

    /// Rule applied to every request
    #[serde(default = "default_general_rule")]
    pub general: RateLimitRuleConfig,

    /// Rule applied to login and registration
    #[serde(default = "default_auth_rule")]
    pub auth: RateLimitRuleConfig,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            general: default_general_rule(),
            auth: default_auth_rule(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_general_rule() -> RateLimitRuleConfig {
    RateLimitRuleConfig {
        window_secs: 900,
        max_requests: 100,
        fail_closed: false,
    }
}

fn default_auth_rule() -> RateLimitRuleConfig {
    RateLimitRuleConfig {
        window_secs: 900,
        max_requests: 5,
        fail_closed: true,
    }
}

/// A single throttling rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitRuleConfig {
    /// Window length in seconds
    pub window_secs: u64,

    /// Requests admitted per window
    pub max_requests: u64,

    /// Deny instead of admit when the counter store is unavailable
    #[serde(default)]
    pub fail_closed: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Upper bound for a single credential store call
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/casegate.db".to_string()
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "casegate".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
