//! # Inkwell - single-author blog server
//!
//! Serves posts and comments from SQLite and keeps comment spam out with a
//! rotating arithmetic CAPTCHA and a language check for first-time
//! commenters.
//!
//! ## Architecture
//! ```text
//! Reverse proxy → Inkwell → SQLite
//!                    ↓
//!          Language classifier (HTTP, bounded wait)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use inkwell_common::Author;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod auth;
mod captcha;
mod comments;
mod config;
mod feed;
mod httputil;
mod language;
mod metrics;
mod middleware;
mod notify;
mod routes;
mod session;
mod state;
mod storage;

use config::AppConfig;
use notify::{LogMailer, Notifier, notifier_worker};
use state::AppState;
use storage::{SqliteStorage, Storage};

/// Inkwell blog server
#[derive(Parser, Debug)]
#[command(name = "inkwell")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/inkwell.toml")]
    config: String,

    /// Database URL (overrides config)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,

    /// Print a password hash for the [author] config section and exit
    #[arg(long, value_name = "PASSWORD")]
    hash_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    if let Some(password) = &args.hash_password {
        let hash = auth::hash_password(password, auth::DEFAULT_COST).context("Failed to hash password")?;
        println!("{hash}");
        return Ok(());
    }

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;
    middleware::install_panic_hook();

    info!("🖋️ Starting Inkwell v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    // Open the database
    let storage = SqliteStorage::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    info!("✅ Database ready: {}", config.database_url);
    seed_author(&storage, &config).await?;

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Spawn the notification worker
    let notifier = if config.notifications.send_email {
        let (notifier, rx) = Notifier::new(config.notifications.queue_capacity);
        let mailer = Arc::new(LogMailer::new(config.notifications.admin_email.clone()));
        let worker_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            notifier_worker(mailer, rx, worker_shutdown).await;
        });
        Some(notifier)
    } else {
        None
    };

    // Initialize application state
    let state = AppState::new(config.clone(), Arc::new(storage), notifier)?;

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 Inkwell listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("👋 Inkwell shutdown complete");
    Ok(())
}

/// Insert the configured author when the database has none
async fn seed_author(storage: &SqliteStorage, config: &AppConfig) -> Result<()> {
    let Some(author) = &config.author else {
        return Ok(());
    };

    let seeded = storage
        .ensure_author(&Author {
            id: 0,
            username: author.username.clone(),
            password_hash: author.password_hash.clone(),
            full_name: author.full_name.clone(),
            email: author.email.clone(),
            website: author.website.clone(),
        })
        .await
        .context("Failed to seed author")?;

    if seeded {
        info!(user = %author.username, "👤 Author created from configuration");
    }
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
