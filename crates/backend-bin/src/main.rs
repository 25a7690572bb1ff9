// ============================
// crates/backend-bin/src/main.rs
// ============================
use anyhow::Context;
use campus_backend::{config::Settings, create_router, relay::RoomRelay, AppState};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Campus community server
#[derive(Parser, Debug)]
#[command(name = "campus-server", version, about)]
struct Cli {
    /// Configuration file (missing file means defaults)
    #[arg(short, long, default_value = "campus.toml")]
    config: PathBuf,

    /// Override the bind address
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve on Ctrl-C, then stop the relay so open sockets drain
async fn shutdown_signal(relay: RoomRelay) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutdown signal received");
    relay.shutdown();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }

    init_tracing(&settings);

    let bind_addr = settings.bind_addr;
    let state = Arc::new(AppState::from_settings(settings).await?);

    let cleanup = state
        .sessions
        .spawn_cleanup(state.settings.session.cleanup_interval());

    let app = create_router(state.clone());

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.relay.clone()))
        .await?;

    cleanup.abort();
    tracing::info!("server stopped");
    Ok(())
}
