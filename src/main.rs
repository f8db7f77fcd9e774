// src/main.rs
// recalld-server binary entrypoint.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use recalld::config::AppConfig;
use recalld::state::AppState;
use tracing::info;

/// recalld memory server
#[derive(Parser, Debug)]
#[command(name = "recalld-server")]
#[command(author = "Conary Labs")]
#[command(version)]
#[command(about = "Personal conversational memory agent", long_about = None)]
struct CliArgs {
    /// Path to a YAML config file.
    #[arg(long, env = "RECALLD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    init_tracing(&config);

    let state = AppState::new(config.clone()).await?;
    let app = recalld::api::build_router(state.clone());

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "recalld-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.server.is_production() {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }
}

/// Waits for Ctrl+C (or SIGTERM on unix), then signals `state.shutdown` so
/// detached background tasks (ProcessConversation, hit-recording, housekeeping)
/// can observe it and drain before the process exits.
async fn shutdown_signal(state: std::sync::Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining background tasks");
    state.shutdown.cancel();
}
