//! Countdown Server - A state-managed HTTP server hosting a countdown timer
//!
//! This is the main entry point for the countdown-server application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use countdown_server::{
    config::Config,
    state::AppState,
    api::create_router,
    tasks::TokioScheduler,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_server={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, edit_policy={:?}",
          config.host, config.port, config.edit_policy());

    let scheduler = TokioScheduler::current().map_err(anyhow::Error::msg)?;

    // Create application state
    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        config.edit_policy(),
        Arc::new(scheduler),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /duration - Set hours, minutes, seconds");
    info!("  POST /start    - Start or resume the countdown");
    info!("  POST /pause    - Pause the countdown");
    info!("  POST /reset    - Reset the timer");
    info!("  GET  /status   - Current timer state");
    info!("  GET  /events   - Server-sent timer events");
    info!("  GET  /health   - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Stop any running tick loop before the runtime goes away
    state.timer.reset();
    info!("Server shutdown complete");
    Ok(())
}
