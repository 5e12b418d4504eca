//! ensayo-cms - content management service
//!
//! Serves the admin content/lesson management API and the learner-facing
//! catalog and progress API over one SQLite database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ensayo_common::config::{self, ROOT_FOLDER_ENV};
use ensayo_common::db::init_database;
use ensayo_cms::storage::Presigner;
use ensayo_cms::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};

/// Default HTTP port
const DEFAULT_PORT: u16 = 5800;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "ensayo-cms")]
#[command(about = "Ensayo content management service", long_about = None)]
#[command(version)]
struct Args {
    /// HTTP listen port
    #[arg(short, long, env = "ENSAYO_PORT")]
    port: Option<u16>,

    /// Root folder holding ensayo.db (also ENSAYO_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to the TOML configuration file
    #[arg(short, long, env = "ENSAYO_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The log level comes from TOML, so read it before the subscriber exists
    let toml_result = config::load_toml_config(args.config.as_deref());
    let level = toml_result
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Ensayo content management (ensayo-cms) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml_config = toml_result.context("Failed to load configuration")?;

    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    let db_path = config::prepare_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let presigner = match &toml_config.storage {
        Some(storage) => match Presigner::from_config(storage) {
            Ok(p) => {
                info!("✓ Asset uploads enabled (bucket {})", storage.bucket);
                Some(p)
            }
            Err(e) => {
                warn!("Asset uploads disabled: {}", e);
                None
            }
        },
        None => {
            info!("No [storage] configured - upload endpoints disabled");
            None
        }
    };

    let state = AppState::with_max_lock_wait(
        pool,
        presigner,
        toml_config.database.max_lock_wait_ms,
    );
    let app = build_router(state);

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr = format!("{}:{}", args.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("ensayo-cms listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ensayo-cms stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
