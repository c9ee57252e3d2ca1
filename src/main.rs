// ABOUTME: Entry point for the podshelf binary.
// ABOUTME: Parses CLI arguments, initializes tracing and storage, then serves HTTP until signalled.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use podshelf_server::{AppState, FeedFetcher, PodshelfConfig, serve};
use podshelf_store::StorageManager;
use tokio::net::TcpListener;

/// Podcast library service backed by a single SQLite file.
#[derive(Parser, Debug)]
#[command(name = "podshelf", version, about)]
struct Cli {
    /// Port to listen on (overrides PODSHELF_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding podshelf.db (overrides PODSHELF_DATA_DIR)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Longest wait for the database writer, in milliseconds (overrides PODSHELF_WRITE_TIMEOUT_MS)
    #[arg(long)]
    write_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podshelf=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = PodshelfConfig::from_env().context("invalid configuration")?;
    if let Some(port) = cli.port {
        config.listen_port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(ms) = cli.write_timeout_ms {
        config = config
            .with_write_timeout_ms(ms)
            .context("invalid --write-timeout-ms")?;
    }

    let storage = StorageManager::open(&config.store_config())
        .with_context(|| format!("failed to open storage in {}", config.data_dir.display()))?;
    tracing::info!(path = %storage.path().display(), "storage ready");

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "podshelf listening");

    let fetcher = FeedFetcher::new(config.fetch_timeout).context("failed to build feed client")?;
    let state = Arc::new(AppState::new(storage.clone(), fetcher));
    serve(listener, state, shutdown_signal())
        .await
        .context("server error")?;

    storage.shutdown().await.context("failed to close storage")?;
    tracing::info!("podshelf stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}
