use std::sync::Arc;

use tracing::{info, warn};

use room_egress::api::{ApiServer, AppState};
use room_egress::config::AppConfig;
use room_egress::egress::{EgressOrchestrator, LiveKitEgressClient};
use room_egress::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let _log_guard = logging::init_logging(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        output_dir = %config.egress.output_dir.display(),
        backend_timeout_secs = config.egress.backend_timeout.as_secs(),
        single_active_per_session = config.egress.single_active_per_session,
        "Starting room-egress"
    );

    let backend = Arc::new(LiveKitEgressClient::new(&config.backend)?);
    let orchestrator = Arc::new(EgressOrchestrator::from_config(backend, &config.egress));

    let server = ApiServer::new(config.server.clone(), AppState::new(orchestrator));
    let cancel_token = server.cancel_token();

    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_token.cancel();
    });

    server.run().await?;

    info!("room-egress stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
