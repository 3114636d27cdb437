//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;
use uuid::Uuid;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call campus_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.gateway_port", 8081)?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 5)?
        .set_default("limits.max_message_length", 4000)?
        .set_default("limits.page_size", 50)?
        .set_default("rate_limit.window_secs", 60)?
        .set_default("rate_limit.general_max", 300)?
        .set_default("rate_limit.ai_max", 10)?
        .set_default("rate_limit.webhook_max", 60)?
        .set_default(
            "moderation.sub_channel_names",
            vec!["chat", "announcement", "showcase"],
        )?
        // Owner of record for channels auto-provisioned by the approval
        // cascade when no natural owner exists.
        .set_default(
            "moderation.system_user_id",
            "00000000-0000-0000-0000-000000000001",
        )?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (CAMPUS_SERVER__HOST, CAMPUS_DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("CAMPUS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
    pub rate_limit: RateLimitConfig,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub gateway_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL — optional; omit for single-process mode
    /// (in-process backplane, rate limiting disabled).
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT verification secret (HS256). Tokens are issued by the platform's
    /// auth service; this backend only verifies them.
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_message_length: u32,
    /// Default and maximum page size for message history queries.
    pub page_size: u32,
}

/// Fixed-window request ceilings, per scope.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub general_max: i64,
    pub ai_max: i64,
    pub webhook_max: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModerationConfig {
    /// Sub-channels auto-provisioned under a top-level channel when a join
    /// request is approved.
    pub sub_channel_names: Vec<String>,
    /// Fallback owner for auto-provisioned sub-channels.
    pub system_user_id: Uuid,
}
