use anyhow::{Result, anyhow};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::TransferConfig;
use crate::destination::Destination;
use crate::types::error::{UploadError, error_detail};
use crate::types::event_manager::EventSink;
use crate::types::token::UploadCancellationToken;
use crate::types::{CompletedPart, PartDestination, UploadEvent};

/// Transfers one part to its pre-signed destination with bounded retries.
///
/// The uploader never touches the session. The completed part is returned to the caller,
/// which is the only place where it gets recorded.
pub struct PartUploader {
    destination: Destination,
    transfer_config: TransferConfig,
    cancellation_token: UploadCancellationToken,
    event_sink: Option<(String, EventSink)>,
}

impl PartUploader {
    pub fn new(
        destination: Destination,
        transfer_config: TransferConfig,
        cancellation_token: UploadCancellationToken,
    ) -> Self {
        Self {
            destination,
            transfer_config,
            cancellation_token,
            event_sink: None,
        }
    }

    pub fn with_event_sink(mut self, session_id: &str, event_sink: EventSink) -> Self {
        self.event_sink = Some((session_id.to_string(), event_sink));
        self
    }

    pub async fn upload(&self, part: &PartDestination, body: Bytes) -> Result<CompletedPart> {
        let max_attempts = self.transfer_config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            if self.cancellation_token.is_cancelled() {
                return Err(anyhow!(UploadError::Cancelled));
            }

            let result = tokio::select! {
                result = self.destination.put_part(&part.upload_url, body.clone()) => result,
                _ = self.cancellation_token.cancelled() => {
                    debug!(part_number = part.part_number, "part upload has been cancelled.");
                    return Err(anyhow!(UploadError::Cancelled));
                }
            };

            let e = match result {
                Ok(token) => {
                    debug!(
                        part_number = part.part_number,
                        attempt = attempt,
                        size = body.len(),
                        "part has been uploaded."
                    );
                    return Ok(CompletedPart {
                        part_number: part.part_number,
                        token,
                    });
                }
                Err(e) => e,
            };

            let error = error_detail(&e);
            if max_attempts <= attempt {
                return Err(anyhow!(UploadError::PartRetryExhausted {
                    part_number: part.part_number,
                    attempts: attempt,
                    reason: error,
                }));
            }

            warn!(
                part_number = part.part_number,
                attempt = attempt,
                error = error,
                "part upload failed. retrying."
            );
            if let Some((session_id, event_sink)) = &self.event_sink {
                event_sink
                    .emit(
                        Some(session_id.as_str()),
                        UploadEvent::PartRetry {
                            part_number: part.part_number,
                            attempt,
                            error,
                        },
                    )
                    .await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.transfer_config.backoff_after_attempt(attempt)) => {}
                _ = self.cancellation_token.cancelled() => {
                    return Err(anyhow!(UploadError::Cancelled));
                }
            }
        }
    }
}
