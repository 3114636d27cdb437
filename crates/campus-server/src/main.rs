//! # Campus Server
//!
//! Main binary with two modes:
//! - `serve` — run the REST API and the WebSocket gateway
//! - `sweep` — run one ban-reconciliation pass and exit (cron-driven)
//!
//! Multiple `serve` processes may run side by side; the Redis backplane keeps
//! their gateway rooms in sync. Without Redis configured the server runs
//! single-process with an in-memory backplane.

use campus_api::AppState;
use campus_db::Database;
use campus_gateway::GatewayState;
use campus_gateway::backplane::{Backplane, LocalBackplane, RedisBackplane};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "campus", version, about = "Campus community backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API and gateway servers (default)
    Serve,
    /// Reconcile expired bans once and exit
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = campus_common::config::init()?;

    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus=debug,tower_http=debug".into()),
        )
        .with_target(true)
        .init();

    tracing::info!("Starting Campus v{}", env!("CARGO_PKG_VERSION"));

    // Connect to databases
    let db = Database::connect(config).await?;

    // Run migrations
    db.migrate().await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db).await,
        Command::Sweep => sweep(db).await,
    }
}

async fn serve(db: Database) -> anyhow::Result<()> {
    let config = campus_common::config::get();

    // === Pub/sub backplane ===
    // Bridges API mutations and gateway rooms across every server process.
    let backplane: Arc<dyn Backplane> = match &config.redis.url {
        Some(url) => {
            let bp = RedisBackplane::connect(url).await?;
            tracing::info!("Redis backplane ready");
            Arc::new(bp)
        }
        None => {
            tracing::warn!("No Redis configured — in-process backplane only");
            Arc::new(LocalBackplane::new())
        }
    };

    // === REST API Server ===
    let api_state = AppState {
        db: db.clone(),
        backplane: backplane.clone(),
    };
    let api_router = campus_api::build_router(api_state);
    let api_addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // === WebSocket Gateway ===
    let gateway_state = GatewayState::new(db, backplane);
    let gateway_router = campus_gateway::build_router(gateway_state);
    let gateway_addr = SocketAddr::new(config.server.host.parse()?, config.server.gateway_port);

    tracing::info!("REST API listening on http://{api_addr}");
    tracing::info!("Gateway listening on ws://{gateway_addr}");

    // Run both servers concurrently
    tokio::try_join!(
        async {
            let listener = tokio::net::TcpListener::bind(api_addr).await?;
            axum::serve(listener, api_router).await?;
            Ok::<_, anyhow::Error>(())
        },
        async {
            let listener = tokio::net::TcpListener::bind(gateway_addr).await?;
            axum::serve(listener, gateway_router).await?;
            Ok::<_, anyhow::Error>(())
        },
    )?;

    Ok(())
}

/// One sweeper pass. Scheduling belongs to cron/systemd timers; re-running
/// early or twice is harmless.
async fn sweep(db: Database) -> anyhow::Result<()> {
    let swept = campus_db::workflow::sweep_expired_bans(&db.pg, chrono::Utc::now()).await?;
    tracing::info!(swept, "Sweep finished");
    Ok(())
}
