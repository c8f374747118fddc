use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loadctl_api::config::ServerConfig;
use loadctl_api::router::build_app_router;
use loadctl_api::state::AppState;
use loadctl_events::{LogBroker, NotificationDispatcher};
use loadctl_runner::compare::{CommandComparer, ReportComparer};
use loadctl_runner::RunSupervisor;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadctl_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        workers = config.workers.len(),
        log_level = %config.log_level.as_str(),
        "Loaded server configuration"
    );

    // --- Run log ---
    let broker = Arc::new(LogBroker::with_threshold(config.log_level));

    // --- Notifications ---
    let notifier = Arc::new(NotificationDispatcher::new(
        config.notifications.clone(),
        Arc::clone(&broker),
    )?);
    if !notifier.enabled() {
        tracing::info!("Notifications disabled");
    }

    // --- Run supervisor ---
    let supervisor = RunSupervisor::new(config.runner_config(), Arc::clone(&broker), notifier);

    // --- Report comparison ---
    let comparer = config
        .compare_command
        .as_deref()
        .and_then(CommandComparer::from_command_line)
        .map(|c| Arc::new(c) as Arc<dyn ReportComparer>);
    if comparer.is_none() {
        tracing::info!("COMPARE_COMMAND not set, report comparison disabled");
    }

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        supervisor: supervisor.clone(),
        broker,
        comparer,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if supervisor.shutdown(timeout).await {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Active run did not finish before the shutdown timeout"
        );
    }
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
