//! mailgate HTTP server entry point
//!
//! Starts the REST API over the configured notmuch database.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailgate::core::config::{Config, LogFormat};
use mailgate::core::services::Services;
use mailgate::core::xdg::XdgDirs;
use mailgate::http;

/// HTTP API for searching and tagging a notmuch email index
#[derive(Parser, Debug)]
#[command(name = "mailgate")]
#[command(version)]
#[command(about = "HTTP API over a notmuch email index", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "MAILGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind (overrides config and environment)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and environment)
    #[arg(short, long)]
    port: Option<u16>,

    /// notmuch database location (overrides config and environment)
    #[arg(short, long)]
    database: Option<PathBuf>,
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter.as_str().into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration: flags > env > file > defaults
    let xdg = XdgDirs::new();
    let mut config = Config::load_with_xdg(&xdg, args.config.as_deref())?;
    config.merge_overrides(args.host, args.port, args.database);
    config.validate()?;

    init_tracing(&config);

    tracing::info!("Starting mailgate");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    xdg.log_paths();
    config.log_config();

    let services = Arc::new(Services::from_config(config.clone()));

    // Startup check is informational only; /health keeps reporting
    let gateway = Arc::clone(&services.gateway);
    match tokio::task::spawn_blocking(move || gateway.check_connection()).await? {
        Ok(()) => tracing::info!("notmuch database reachable"),
        Err(e) => tracing::warn!("notmuch database not reachable yet: {}", e),
    }

    let app = http::router(services);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("Service ready - Health check at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
