use anyhow::{Result, anyhow};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PollConfig;
use crate::destination::{Destination, ProcessingState};
use crate::types::ProcessingOutputs;
use crate::types::error::{UploadError, error_detail};
use crate::types::token::UploadCancellationToken;

const DEFAULT_PROCESSING_FAILURE_REASON: &str = "processing failed without a reason";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTick {
    Processing(String),
    Completed(ProcessingOutputs),
}

/// Periodic status checks after finalize, bounded by a hard timeout measured from the
/// first call to `next_tick`.
pub struct StatusPoller {
    destination: Destination,
    poll_config: PollConfig,
    cancellation_token: UploadCancellationToken,
    deadline: Option<Instant>,
}

impl StatusPoller {
    pub fn new(
        destination: Destination,
        poll_config: PollConfig,
        cancellation_token: UploadCancellationToken,
    ) -> Self {
        Self {
            destination,
            poll_config,
            cancellation_token,
            deadline: None,
        }
    }

    /// Waits one interval and asks for the processing status.
    ///
    /// Transport errors are missed ticks. `FAILED` and the timeout are errors.
    pub async fn next_tick(&mut self, session_id: &str) -> Result<PollTick> {
        let deadline = *self
            .deadline
            .get_or_insert_with(|| Instant::now() + self.poll_config.timeout());

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_config.interval()) => {}
                _ = self.cancellation_token.cancelled() => {
                    return Err(anyhow!(UploadError::Cancelled));
                }
            }

            if deadline <= Instant::now() {
                return Err(anyhow!(UploadError::PollTimeout(
                    self.poll_config.timeout_seconds
                )));
            }

            let result = tokio::select! {
                result = self.destination.status(session_id) => result,
                _ = self.cancellation_token.cancelled() => {
                    return Err(anyhow!(UploadError::Cancelled));
                }
            };

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        session_id = session_id,
                        error = error_detail(&e),
                        "status poll failed. waiting for the next tick."
                    );
                    continue;
                }
            };

            return match response.processing_state() {
                ProcessingState::Completed(outputs) => {
                    debug!(session_id = session_id, "processing has been completed.");
                    Ok(PollTick::Completed(outputs))
                }
                ProcessingState::Failed(reason) => Err(anyhow!(UploadError::ProcessingFailed(
                    reason
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| DEFAULT_PROCESSING_FAILURE_REASON.to_string())
                ))),
                ProcessingState::InProgress(status) => {
                    debug!(session_id = session_id, status = status, "processing.");
                    Ok(PollTick::Processing(status))
                }
            };
        }
    }
}
