//! OS signal handling.

use crate::lifecycle::shutdown::Shutdown;

/// Trigger `shutdown` on the first Ctrl-C.
///
/// Returns when the signal arrives or shutdown was triggered elsewhere.
pub async fn shutdown_on_ctrl_c(shutdown: Shutdown) {
    let token = shutdown.token();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    tracing::info!("Ctrl-C received, cancelling session");
                    shutdown.trigger();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
            }
        }
        _ = token.cancelled() => {}
    }
}
