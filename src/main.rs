use anyhow::{Context, Result};
use axum::serve;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use torrent_relay::core::config::Config;
use torrent_relay::core::routes::build_router;
use torrent_relay::core::state::AppState;
use torrent_relay::core::tracing_init::init_tracing;
use torrent_relay::retention::reaper::spawn_reaper_task;
use torrent_relay::stores::torrent_store::create_dir_all;
use tracing::{error, info, Level};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("config.toml")
    };

    // Load and validate configuration
    let config = Config::from_file(&config_path).context(format!(
        "Failed to load configuration from '{}'",
        config_path.display()
    ))?;

    init_tracing(&config.logging)?;

    // Build Tokio runtime with configured number of threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.num_threads)
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config, config_path))
}

async fn async_main(config: Config, config_path: PathBuf) -> Result<()> {
    info!(
        config_path = %config_path.display(),
        port = config.server.port,
        num_threads = config.server.num_threads,
        torrent_dir = %config.storage.torrent_dir.display(),
        download_dir = %config.storage.download_dir.display(),
        layout = ?config.storage.layout,
        agent = %config.agent.program.display(),
        grace_period_seconds = config.retention.grace_period_secs,
        "Torrent relay starting"
    );

    // Fail fast on unusable storage rather than on the first upload
    create_dir_all(&config.storage.torrent_dir)
        .await
        .context(format!(
            "Failed to create torrent directory {}",
            config.storage.torrent_dir.display()
        ))?;
    create_dir_all(&config.storage.download_dir)
        .await
        .context(format!(
            "Failed to create download directory {}",
            config.storage.download_dir.display()
        ))?;

    let state = Arc::new(AppState::new(config.clone()));

    spawn_reaper_task(state.reaper(), config.retention.reap_interval());

    info!(
        reap_interval_seconds = config.retention.reap_interval_secs,
        "Download reaper started"
    );

    let app = build_router(state).layer(
        ServiceBuilder::new().layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        ),
    );

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind TCP listener to {}", addr))?;

    info!(address = %addr, "HTTP server started, waiting for shutdown signal");

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Shutting down gracefully");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutdown signal received, starting graceful shutdown; running agents are left running");
}
