use clap::Parser;
use hashq::{HashService, TokenTerminator};
use hashq_server::server::{
    config::{CliArgs, ServerConfig},
    service::handler::router,
    telemetry::init_telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    tracing::info!("Starting main service");

    let terminator = TokenTerminator::default();
    let terminate = terminator.token();
    let service = HashService::new(config.service.clone(), Arc::new(terminator));

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config);

    axum::serve(listener, router(service.clone()))
        .with_graceful_shutdown(shutdown_signal(terminate))
        .await?;

    if !service.drain(config.drain_timeout).await {
        tracing::warn!(
            "Exiting with {} digests still pending",
            service.in_flight()
        );
    }

    tracing::info!(
        "Main service ending ({} passwords accepted)",
        service.total_accepted()
    );
    providers.shutdown();
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting API on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting API on {} with a {:?} hash delay",
            config.server_addr,
            config.service.delay
        );
    }
}

/// Resolves on Ctrl+C, SIGTERM, or once the service's own shutdown grace
/// delay has elapsed (`terminate` cancelled).
async fn shutdown_signal(terminate: CancellationToken) {
    #[cfg(unix)]
    let sigterm = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = sigterm => {
            tracing::info!("Received SIGTERM signal");
        },
        () = terminate.cancelled() => {
            tracing::info!("Shutdown grace delay elapsed");
        },
    }

    tracing::info!("API service shutting down gracefully");
}
