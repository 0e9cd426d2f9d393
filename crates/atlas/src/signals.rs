//! Signal handling for graceful server shutdown.
//!
//! Cross-platform signal handling so the server can shut down cleanly when
//! receiving termination signals.

use tokio::signal;
use tracing::info;

/// Waits for a shutdown signal.
///
/// # Platform Support
///
/// * **Unix platforms**: Handles SIGINT and SIGTERM signals
/// * **Windows**: Handles Ctrl+C
///
/// # Returns
///
/// `Ok(())` when a shutdown signal is received, or an error if signal
/// handling setup failed.
pub async fn wait_for_shutdown() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    info!("Received shutdown signal - initiating graceful shutdown");
    Ok(())
}
