use anyhow::{Context, Result};
use reviewer_service::config::Config;
use reviewer_service::services::http_server::{build_router, serve};
use reviewer_service::{db, AssignmentService};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    // Also installs the bridge that forwards `log` records.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::initialize(&config.database_path, config.database_max_connections)
        .await
        .context("Failed to initialize database")?;
    log::info!("Database ready at {}", config.database_path.display());

    let service = AssignmentService::new(pool.clone());
    let router = build_router(service, config.request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to port {}", config.http_port))?;

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(serve(listener, router, shutdown.clone()));

    tokio::select! {
        res = &mut server => {
            res.context("Server task panicked")?.context("Server error")?;
        }
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received");
            shutdown.cancel();
            match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
                Ok(res) => res.context("Server task panicked")?.context("Server error")?,
                Err(_) => {
                    log::warn!(
                        "In-flight requests did not finish within {:?}; aborting",
                        config.shutdown_timeout
                    );
                    server.abort();
                }
            }
        }
    }

    pool.close().await;
    log::info!("Database pool closed");

    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
