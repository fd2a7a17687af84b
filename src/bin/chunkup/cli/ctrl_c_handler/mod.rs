use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, error, warn};

use chunkup::types::token::UploadCancellationToken;

use super::EXIT_CODE_CANCELLED;

/// Cancels the upload on the first ctrl-c.
///
/// The controller still has to send the cancel request for the session, so the process
/// keeps running. A second ctrl-c exits without waiting for it.
pub fn spawn_ctrl_c_handler(cancellation_token: UploadCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("upload cancellation token cancelled.")
            }
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        warn!("ctrl-c received. cancelling the upload session, press ctrl-c again to exit immediately.");
                        cancellation_token.cancel();
                        spawn_force_exit_handler();
                    }
                    Err(e) => {
                        error!("failed to listen for ctrl-c signal: {e}");
                    }
                }
            }
        }
    })
}

fn spawn_force_exit_handler() -> JoinHandle<()> {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            error!("second ctrl-c received. exiting without waiting for the cancel request.");
            std::process::exit(EXIT_CODE_CANCELLED);
        }
    })
}
