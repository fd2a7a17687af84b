use anyhow::{Context, Result, anyhow};
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::config::TransferConfig;
use crate::destination::Destination;
use crate::types::error::{UploadError, error_detail, is_cancelled_error};
use crate::types::event_manager::EventSink;
use crate::types::token::UploadCancellationToken;
use crate::types::{CompletedPart, PartDestination};
use crate::upload::chunk_planner::ChunkPlan;
use crate::upload::part_uploader::PartUploader;
use crate::upload::source::UploadSource;

/// Splits pending parts into batches and runs each batch with one worker per part.
///
/// A batch is fully resolved before the next one starts, so at most `batch_width`
/// transfers are in flight at any time.
pub struct BatchCoordinator {
    destination: Destination,
    transfer_config: TransferConfig,
    cancellation_token: UploadCancellationToken,
    event_sink: Option<EventSink>,
}

impl BatchCoordinator {
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

    pub fn with_event_sink(mut self, event_sink: EventSink) -> Self {
        self.event_sink = Some(event_sink);
        self
    }

    pub fn batches(&self, pending_parts: &[u32]) -> Vec<Vec<u32>> {
        let width = self.transfer_config.batch_width.max(1) as usize;
        pending_parts
            .chunks(width)
            .map(|batch| batch.to_vec())
            .collect()
    }

    /// Fetches fresh destinations for exactly `part_numbers` and spawns their workers.
    pub async fn start_batch(
        &self,
        session_id: &str,
        plan: &ChunkPlan,
        source: &UploadSource,
        part_numbers: &[u32],
    ) -> Result<BatchRun> {
        let result = tokio::select! {
            result = self.destination.chunk_urls(session_id, part_numbers) => result,
            _ = self.cancellation_token.cancelled() => {
                return Err(anyhow!(UploadError::Cancelled));
            }
        };
        let destinations = result.map_err(|e| {
            anyhow!(UploadError::ChunkUrlsFailed {
                part_numbers: part_numbers.to_vec(),
                reason: error_detail(&e),
            })
        })?;

        let mut work = Vec::with_capacity(part_numbers.len());
        for part_number in part_numbers {
            let destination = find_destination(&destinations, *part_number)?;
            let range = plan.range(*part_number).ok_or_else(|| {
                anyhow!(UploadError::InvalidInput(format!(
                    "part number {part_number} is out of range 1..={}",
                    plan.total_parts()
                )))
            })?;
            work.push((destination, range));
        }

        let batch_token = self.cancellation_token.child_token();
        let mut join_set = JoinSet::new();
        for (destination, range) in work {
            let mut uploader = PartUploader::new(
                dyn_clone::clone_box(&*self.destination),
                self.transfer_config,
                batch_token.clone(),
            );
            if let Some(event_sink) = &self.event_sink {
                uploader = uploader.with_event_sink(session_id, event_sink.clone());
            }
            let source = source.clone();

            join_set.spawn(async move {
                let body = source.read_part(range).await?;
                uploader.upload(&destination, body).await
            });
        }

        debug!(
            session_id = session_id,
            part_numbers = ?part_numbers,
            "batch has been started."
        );

        Ok(BatchRun {
            join_set,
            batch_token,
            first_error: None,
        })
    }
}

fn find_destination(destinations: &[PartDestination], part_number: u32) -> Result<PartDestination> {
    destinations
        .iter()
        .find(|destination| destination.part_number == part_number && !destination.upload_url.is_empty())
        .cloned()
        .ok_or_else(|| anyhow!(UploadError::MissingUploadUrl(part_number)))
}

/// A running batch. Dropping it aborts every worker that is still running.
pub struct BatchRun {
    join_set: JoinSet<Result<CompletedPart>>,
    batch_token: UploadCancellationToken,
    first_error: Option<anyhow::Error>,
}

impl BatchRun {
    /// Yields completed parts in completion order.
    ///
    /// The first failure cancels the remaining workers of the batch. Parts that still
    /// finish are yielded, and the failure itself is yielded last.
    pub async fn next(&mut self) -> Option<Result<CompletedPart>> {
        while let Some(joined) = self.join_set.join_next().await {
            let result = joined
                .context("tokio::task::JoinSet::join_next() failed.")
                .and_then(|result| result);

            match result {
                Ok(part) => return Some(Ok(part)),
                Err(e) if self.first_error.is_none() => {
                    if !is_cancelled_error(&e) {
                        warn!(
                            error = error_detail(&e),
                            "part failed. cancelling the rest of the batch."
                        );
                    }
                    self.batch_token.cancel();
                    self.first_error = Some(e);
                }
                Err(e) => {
                    trace!(error = error_detail(&e), "sibling part stopped.");
                }
            }
        }

        self.first_error.take().map(Err)
    }
}
