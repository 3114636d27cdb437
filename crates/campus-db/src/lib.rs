//! # campus-db
//!
//! Database layer for Campus. Manages connections to:
//! - **PostgreSQL** — Channels, messages, memberships, role grants
//! - **Redis** — Rate-limit counters and the pub/sub backplane
//!
//! Redis is optional: without it the server runs single-process with an
//! in-process backplane and rate limiting disabled.

pub mod redis_pool;
pub mod repository;
pub mod workflow;

use anyhow::Result;
use sqlx::PgPool;

/// Shared database state passed through Axum extractors.
#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
    pub redis: Option<redis::aio::ConnectionManager>,
}

impl Database {
    /// Connect to all database backends.
    pub async fn connect(config: &campus_common::config::AppConfig) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pg = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await?;
        tracing::info!("Connected to PostgreSQL");

        let redis = match &config.redis.url {
            Some(url) => {
                tracing::info!("Connecting to Redis...");
                let client = redis::Client::open(url.as_str())?;
                let manager = redis::aio::ConnectionManager::new(client).await?;
                tracing::info!("Connected to Redis");
                Some(manager)
            }
            None => {
                tracing::warn!("No Redis configured — single-process mode");
                None
            }
        };

        Ok(Self { pg, redis })
    }

    /// Cheap connectivity probe for health endpoints.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pg).await.is_ok()
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pg).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }
}
