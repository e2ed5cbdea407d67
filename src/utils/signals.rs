//! Signal handling for graceful shutdown

use std::{future::Future, io};
use signal_hook_tokio::Signals;
use futures::stream::StreamExt;
use tracing::{info, warn};

/// Wait for shutdown signals (SIGTERM, SIGINT)
pub async fn shutdown_signal() {
    let mut signals = match Signals::new([
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
    ]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Failed to register signal handler: {}, falling back to Ctrl-C", e);
            wait_for_ctrl_c(tokio::signal::ctrl_c()).await;
            return;
        }
    };

    if let Some(signal) = signals.next().await {
        info!("Received signal: {}", signal);
    }
}

/// Resolve once `ctrl_c` reports a Ctrl-C. If listening fails there is no
/// way left to ask for shutdown, so this never resolves.
async fn wait_for_ctrl_c(ctrl_c: impl Future<Output = io::Result<()>>) {
    match ctrl_c.await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C: {}, running until killed", e);
            std::future::pending::<()>().await;
        }
    }
}
