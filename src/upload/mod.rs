use anyhow::{Error, Result, anyhow};
use async_channel::Receiver;
use tracing::{debug, error, info, warn};

use crate::Config;
use crate::destination::{Destination, InitiateRequest};
use crate::types::error::{UploadError, error_detail, is_cancelled_error};
use crate::types::event_manager::EventSink;
use crate::types::token::{UploadCancellationToken, create_upload_cancellation_token};
use crate::types::{
    COMPLETED_PROGRESS, CompletedPart, PROCESSING_PROGRESS_CEILING, ProcessingOutputs,
    SessionSnapshot, UploadEvent, UploadOutcome, UploadSession, UploadStatus,
};
use crate::upload::batch_coordinator::BatchCoordinator;
use crate::upload::chunk_planner::ChunkPlan;
use crate::upload::resume_record::ResumeRecord;
use crate::upload::source::UploadSource;
use crate::upload::status_poller::{PollTick, StatusPoller};

pub mod batch_coordinator;
pub mod chunk_planner;
pub mod part_uploader;
pub mod progress;
pub mod resume_record;
pub mod source;
pub mod status_poller;

#[cfg(test)]
mod test_destination;

/// Drives one upload session from initiation to a terminal state.
///
/// The controller is the only writer of its `UploadSession`. Part workers return their
/// results as values and every state change is published as an `UploadEvent`, in order,
/// on the event channel and to the registered event callback.
pub struct UploadSessionController {
    config: Config,
    destination: Destination,
    cancellation_token: UploadCancellationToken,
    session: UploadSession,
    event_sink: EventSink,
    event_receiver: Receiver<UploadEvent>,
}

impl UploadSessionController {
    pub fn new(
        config: Config,
        destination: Destination,
        cancellation_token: UploadCancellationToken,
    ) -> Self {
        let (event_sender, event_receiver) = async_channel::unbounded();
        let event_sink = EventSink::new(event_sender, config.event_manager.clone());

        Self {
            config,
            destination,
            cancellation_token,
            session: UploadSession::default(),
            event_sink,
            event_receiver,
        }
    }

    /// Rebuilds a controller around a previously known session. The next `start_upload`
    /// with the same file skips initiation and every part in `record`.
    pub fn resume(
        config: Config,
        destination: Destination,
        cancellation_token: UploadCancellationToken,
        record: ResumeRecord,
    ) -> Result<Self> {
        let plan = ChunkPlan::new(record.file_size_bytes, record.chunk_size_bytes)?;
        if plan.total_parts() != record.total_parts {
            return Err(anyhow!(UploadError::ResumeMismatch(format!(
                "{} bytes in {} byte parts is {} parts, recorded {}",
                record.file_size_bytes,
                record.chunk_size_bytes,
                plan.total_parts(),
                record.total_parts
            ))));
        }

        let mut session = UploadSession::new(
            &record.file_name,
            record.file_size_bytes,
            &record.mime_type,
            record.chunk_size_bytes,
            record.total_parts,
            record.folder.clone(),
        );
        session.set_session_id(&record.session_id);
        session.restore_parts(&record.parts)?;

        info!(
            session_id = record.session_id,
            uploaded_parts = session.uploaded_part_count(),
            total_parts = session.total_parts,
            "session has been restored."
        );

        let mut controller = Self::new(config, destination, cancellation_token);
        controller.session = session;
        Ok(controller)
    }

    pub fn get_event_receiver(&self) -> Receiver<UploadEvent> {
        self.event_receiver.clone()
    }

    pub fn close_event_sender(&self) {
        self.event_sink.close();
    }

    pub fn cancellation_token(&self) -> UploadCancellationToken {
        self.cancellation_token.clone()
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    pub fn status(&self) -> UploadStatus {
        self.session.status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// `{part_number, token}` pairs in ascending part order, as sent to finalize.
    pub fn finalize_parts(&self) -> Vec<CompletedPart> {
        self.session.finalize_parts()
    }

    /// Uploads `source` and waits for post-processing to finish.
    ///
    /// A restored session continues from its first pending part. A terminal session issues
    /// no further calls; a failed one is continued through `resume` on a new controller.
    pub async fn start_upload(&mut self, source: &UploadSource) -> Result<UploadOutcome> {
        match self.session.status() {
            UploadStatus::Cancelled => return Err(anyhow!(UploadError::SessionCancelled)),
            status @ (UploadStatus::Completed | UploadStatus::Failed) => {
                return Err(anyhow!(UploadError::InvalidState(status)));
            }
            _ => {}
        }
        self.session.clear_error();

        let result = self.run(source).await;
        if let Err(e) = &result {
            if is_cancelled_error(e) {
                self.finish_cancelled().await;
            } else {
                self.finish_failed(e).await;
            }
        }

        result
    }

    /// Stops the session. Idempotent, and a no-op once the session is terminal.
    ///
    /// A running `start_upload` is stopped through the cancellation token instead, since it
    /// holds the controller exclusively.
    pub async fn cancel(&mut self) {
        if self.session.status().is_terminal() {
            return;
        }
        self.finish_cancelled().await;
    }

    /// Discards all local state. A cancelled token is replaced with a fresh one.
    pub fn reset(&mut self) {
        self.session.reset();
        if self.cancellation_token.is_cancelled() {
            self.cancellation_token = create_upload_cancellation_token();
        }
        debug!("session has been reset.");
    }

    async fn run(&mut self, source: &UploadSource) -> Result<UploadOutcome> {
        let mime_type = source.mime_type(self.config.mime_type.as_deref());
        self.validate(source, &mime_type)?;
        if self.cancellation_token.is_cancelled() {
            return Err(anyhow!(UploadError::Cancelled));
        }

        let plan = if self.session.session_id().is_some() {
            self.prepare_resume(source)?
        } else {
            self.initiate(source, &mime_type).await?
        };
        let session_id = self.session_id()?;

        self.transition(UploadStatus::Uploading).await;
        self.emit_progress().await;
        self.upload_pending_parts(&session_id, &plan, source).await?;

        self.transition(UploadStatus::Completing).await;
        self.finalize(&session_id).await?;

        self.transition(UploadStatus::Processing).await;
        let outputs = self.wait_for_processing(&session_id).await?;

        self.session.advance_progress(COMPLETED_PROGRESS);
        self.transition(UploadStatus::Completed).await;
        self.emit_progress().await;
        self.emit(UploadEvent::Completed(outputs.clone())).await;
        self.remove_resume_record().await;

        info!(
            session_id = session_id,
            file_name = self.session.file_name,
            size = self.session.file_size_bytes,
            "upload has been completed."
        );

        Ok(UploadOutcome {
            session_id,
            outputs,
        })
    }

    fn validate(&self, source: &UploadSource, mime_type: &str) -> Result<(), UploadError> {
        let validation_config = &self.config.validation_config;

        if source.file_name().is_empty() {
            return Err(UploadError::InvalidInput(
                "file name must not be empty".to_string(),
            ));
        }
        if source.size() == 0 {
            return Err(UploadError::EmptyFile);
        }
        if validation_config.max_file_size < source.size() {
            return Err(UploadError::FileTooLarge {
                size: source.size(),
                max: validation_config.max_file_size,
            });
        }
        if !validation_config.is_mime_type_accepted(mime_type) {
            return Err(UploadError::UnsupportedMimeType {
                mime_type: mime_type.to_string(),
                accepted_prefix: validation_config
                    .accepted_mime_prefix
                    .clone()
                    .unwrap_or_default(),
            });
        }

        Ok(())
    }

    fn prepare_resume(&mut self, source: &UploadSource) -> Result<ChunkPlan> {
        if self.session.file_name != source.file_name()
            || self.session.file_size_bytes != source.size()
        {
            return Err(anyhow!(UploadError::ResumeMismatch(format!(
                "session holds {} ({} bytes), given {} ({} bytes)",
                self.session.file_name,
                self.session.file_size_bytes,
                source.file_name(),
                source.size()
            ))));
        }

        let plan = ChunkPlan::new(source.size(), self.session.chunk_size_bytes)?;
        info!(
            session_id = self.session.session_id(),
            next_part = self.session.next_pending_part(),
            uploaded_parts = self.session.uploaded_part_count(),
            total_parts = plan.total_parts(),
            "resuming upload."
        );

        Ok(plan)
    }

    async fn initiate(&mut self, source: &UploadSource, mime_type: &str) -> Result<ChunkPlan> {
        let plan = ChunkPlan::new(source.size(), self.config.transfer_config.chunk_size)?;
        self.session = UploadSession::new(
            source.file_name(),
            source.size(),
            mime_type,
            plan.chunk_size_bytes(),
            plan.total_parts(),
            self.config.destination_config.folder.clone(),
        );
        self.transition(UploadStatus::Initiating).await;

        let request = InitiateRequest {
            file_name: self.session.file_name.clone(),
            file_size_bytes: self.session.file_size_bytes,
            mime_type: self.session.mime_type.clone(),
            total_parts: self.session.total_parts,
            chunk_size_bytes: self.session.chunk_size_bytes,
            folder: self.session.folder.clone(),
        };
        let result = tokio::select! {
            result = self.destination.initiate(&request) => result,
            _ = self.cancellation_token.cancelled() => {
                return Err(anyhow!(UploadError::Cancelled));
            }
        };
        let response =
            result.map_err(|e| anyhow!(UploadError::InitiateFailed(error_detail(&e))))?;
        if response.session_id.is_empty() {
            return Err(anyhow!(UploadError::InitiateFailed(
                "empty session id in the response".to_string()
            )));
        }

        self.session.set_session_id(&response.session_id);
        info!(
            session_id = response.session_id,
            file_name = self.session.file_name,
            size = self.session.file_size_bytes,
            total_parts = self.session.total_parts,
            "session has been initiated."
        );
        self.save_resume_record().await;

        Ok(plan)
    }

    async fn upload_pending_parts(
        &mut self,
        session_id: &str,
        plan: &ChunkPlan,
        source: &UploadSource,
    ) -> Result<()> {
        let coordinator = BatchCoordinator::new(
            dyn_clone::clone_box(&*self.destination),
            self.config.transfer_config,
            self.cancellation_token.clone(),
        )
        .with_event_sink(self.event_sink.clone());

        let pending_parts = plan.pending_parts(&self.session.uploaded_parts());
        for batch in coordinator.batches(&pending_parts) {
            if self.cancellation_token.is_cancelled() {
                return Err(anyhow!(UploadError::Cancelled));
            }

            let mut batch_run = coordinator
                .start_batch(session_id, plan, source, &batch)
                .await?;
            while let Some(result) = batch_run.next().await {
                self.on_part_uploaded(session_id, result?).await?;
            }
        }

        Ok(())
    }

    async fn on_part_uploaded(&mut self, session_id: &str, part: CompletedPart) -> Result<()> {
        let part_number = part.part_number;
        if !self.session.record_part(part.clone())? {
            debug!(part_number = part_number, "part has already been recorded.");
            return Ok(());
        }

        self.emit(UploadEvent::PartUploaded {
            part_number,
            bytes: self.session.part_length(part_number),
        })
        .await;

        let acknowledged = [part];
        let result = tokio::select! {
            result = self.destination.mark_uploaded(session_id, &acknowledged) => result,
            _ = self.cancellation_token.cancelled() => Ok(()),
        };
        if let Err(e) = result {
            warn!(
                session_id = session_id,
                part_number = part_number,
                error = error_detail(&e),
                "mark-uploaded acknowledgement failed."
            );
        }

        self.save_resume_record().await;
        self.emit_progress().await;

        Ok(())
    }

    async fn finalize(&mut self, session_id: &str) -> Result<()> {
        if !self.session.is_all_uploaded() {
            return Err(anyhow!(UploadError::FinalizeFailed(format!(
                "{} of {} parts have been uploaded",
                self.session.uploaded_part_count(),
                self.session.total_parts
            ))));
        }

        let parts = self.session.finalize_parts();
        let result = tokio::select! {
            result = self.destination.complete(session_id, &parts) => result,
            _ = self.cancellation_token.cancelled() => {
                return Err(anyhow!(UploadError::Cancelled));
            }
        };
        result.map_err(|e| anyhow!(UploadError::FinalizeFailed(error_detail(&e))))?;

        debug!(session_id = session_id, parts = parts.len(), "upload has been finalized.");
        Ok(())
    }

    async fn wait_for_processing(&mut self, session_id: &str) -> Result<ProcessingOutputs> {
        let mut poller = StatusPoller::new(
            dyn_clone::clone_box(&*self.destination),
            self.config.poll_config,
            self.cancellation_token.clone(),
        );

        loop {
            match poller.next_tick(session_id).await? {
                PollTick::Processing(_) => {
                    let nudged =
                        (self.session.progress_percent() + 1.0).min(PROCESSING_PROGRESS_CEILING);
                    self.session.advance_progress(nudged);
                    self.emit_progress().await;
                }
                PollTick::Completed(outputs) => return Ok(outputs),
            }
        }
    }

    async fn finish_failed(&mut self, e: &Error) {
        let detail = error_detail(e);
        self.session.set_error(&detail);

        if e
            .downcast_ref::<UploadError>()
            .is_some_and(|e| e.is_validation_error())
        {
            warn!(error = detail, "upload has been rejected.");
            return;
        }

        let finalized = self.session.status() == UploadStatus::Processing;
        self.transition(UploadStatus::Failed).await;
        self.emit(UploadEvent::Failed {
            error_detail: detail.clone(),
        })
        .await;

        // A finalized session cannot be continued, so its record is useless.
        if finalized {
            self.remove_resume_record().await;
        }

        error!(
            session_id = self.session.session_id(),
            error = detail,
            "upload has failed."
        );
    }

    async fn finish_cancelled(&mut self) {
        if self.session.status() == UploadStatus::Cancelled {
            return;
        }

        self.cancellation_token.cancel();
        self.session.clear_error();
        self.transition(UploadStatus::Cancelled).await;

        if let Some(session_id) = self.session.session_id() {
            if let Err(e) = self.destination.cancel(session_id).await {
                warn!(
                    session_id = session_id,
                    error = error_detail(&e),
                    "cancel request failed."
                );
            }
        }

        self.emit(UploadEvent::Cancelled).await;
        self.remove_resume_record().await;

        info!(session_id = self.session.session_id(), "upload has been cancelled.");
    }

    async fn transition(&mut self, status: UploadStatus) {
        let previous = self.session.set_status(status);
        if previous == status {
            return;
        }

        debug!(
            session_id = self.session.session_id(),
            from = previous.as_str(),
            to = status.as_str(),
            "status changed."
        );
        self.emit(UploadEvent::StatusChanged {
            from: previous,
            to: status,
        })
        .await;
    }

    async fn emit(&self, event: UploadEvent) {
        self.event_sink
            .emit(self.session.session_id(), event)
            .await;
    }

    async fn emit_progress(&self) {
        self.emit(UploadEvent::Progress(self.session.snapshot()))
            .await;
    }

    fn session_id(&self) -> Result<String> {
        self.session
            .session_id()
            .map(|session_id| session_id.to_string())
            .ok_or_else(|| anyhow!(UploadError::InvalidState(self.session.status())))
    }

    async fn save_resume_record(&self) {
        let Some(path) = &self.config.resume_file else {
            return;
        };
        let Some(record) = ResumeRecord::from_session(&self.session) else {
            return;
        };

        if let Err(e) = record.save(path).await {
            warn!(
                path = %path.display(),
                error = error_detail(&e),
                "failed to save the resume record."
            );
        }
    }

    async fn remove_resume_record(&self) {
        let Some(path) = &self.config.resume_file else {
            return;
        };

        if let Err(e) = ResumeRecord::remove(path).await {
            warn!(
                path = %path.display(),
                error = error_detail(&e),
                "failed to remove the resume record."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::types::MIB;
    use crate::upload::test_destination::ScriptedDestination;

    fn memory_source(file_name: &str, size: u64) -> UploadSource {
        UploadSource::from_bytes(file_name, Bytes::from(vec![0u8; size as usize]))
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.transfer_config.backoff_milliseconds = 10;
        config.poll_config.interval_milliseconds = 10;
        config
    }

    fn create_controller(destination: &ScriptedDestination) -> UploadSessionController {
        UploadSessionController::new(
            fast_config(),
            Box::new(destination.clone()),
            create_upload_cancellation_token(),
        )
    }

    fn statuses(receiver: &Receiver<UploadEvent>) -> Vec<UploadStatus> {
        let mut statuses = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let UploadEvent::StatusChanged { to, .. } = event {
                statuses.push(to);
            }
        }
        statuses
    }

    #[tokio::test(start_paused = true)]
    async fn upload_to_completion() {
        init_dummy_tracing_subscriber();

        let destination = ScriptedDestination::with_statuses(&["TRANSCODING", "COMPLETED"]);
        let mut controller = create_controller(&destination);
        let receiver = controller.get_event_receiver();

        let outcome = controller
            .start_upload(&memory_source("movie.mp4", 25 * MIB))
            .await
            .unwrap();

        assert_eq!(outcome.session_id, "session-1");
        assert_eq!(controller.status(), UploadStatus::Completed);
        assert_eq!(controller.snapshot().progress_percent, 100.0);
        assert_eq!(
            statuses(&receiver),
            vec![
                UploadStatus::Initiating,
                UploadStatus::Uploading,
                UploadStatus::Completing,
                UploadStatus::Processing,
                UploadStatus::Completed
            ]
        );

        let state = destination.state.lock().unwrap();
        assert_eq!(state.initiate_requests[0].total_parts, 3);
        assert_eq!(state.initiate_requests[0].mime_type, "video/mp4");
        let mut marked = state.marked_parts.clone();
        marked.sort();
        assert_eq!(marked, vec![1, 2, 3]);
        assert_eq!(
            state
                .completed_parts
                .as_ref()
                .unwrap()
                .iter()
                .map(|part| part.part_number)
                .collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn reject_before_any_network_call() {
        init_dummy_tracing_subscriber();

        let destination = ScriptedDestination::default();
        let mut controller = create_controller(&destination);

        let e = controller
            .start_upload(&memory_source("movie.mp4", 0))
            .await
            .unwrap_err();
        assert_eq!(e.downcast_ref::<UploadError>(), Some(&UploadError::EmptyFile));

        let e = controller
            .start_upload(&memory_source("slides.pdf", 10))
            .await
            .unwrap_err();
        assert!(matches!(
            e.downcast_ref::<UploadError>(),
            Some(UploadError::UnsupportedMimeType { .. })
        ));

        assert_eq!(controller.status(), UploadStatus::Idle);
        assert!(controller.snapshot().error_detail.is_some());
        assert!(destination.state.lock().unwrap().initiate_requests.is_empty());
    }

    #[tokio::test]
    async fn reject_too_large_file() {
        init_dummy_tracing_subscriber();

        let destination = ScriptedDestination::default();
        let mut config = fast_config();
        config.validation_config.max_file_size = 10;
        let mut controller = UploadSessionController::new(
            config,
            Box::new(destination.clone()),
            create_upload_cancellation_token(),
        );

        let e = controller
            .start_upload(&memory_source("movie.mp4", 11))
            .await
            .unwrap_err();
        assert_eq!(
            e.downcast_ref::<UploadError>(),
            Some(&UploadError::FileTooLarge { size: 11, max: 10 })
        );
    }

    #[tokio::test]
    async fn cancel_idle_session() {
        init_dummy_tracing_subscriber();

        let destination = ScriptedDestination::default();
        let mut controller = create_controller(&destination);
        let receiver = controller.get_event_receiver();

        controller.cancel().await;
        controller.cancel().await;

        assert_eq!(controller.status(), UploadStatus::Cancelled);
        assert!(controller.cancellation_token().is_cancelled());
        // No session id, no cancel request.
        assert_eq!(destination.state.lock().unwrap().cancel_calls, 0);
        assert_eq!(statuses(&receiver), vec![UploadStatus::Cancelled]);

        let e = controller
            .start_upload(&memory_source("movie.mp4", 10))
            .await
            .unwrap_err();
        assert_eq!(
            e.downcast_ref::<UploadError>(),
            Some(&UploadError::SessionCancelled)
        );

        controller.reset();
        assert_eq!(controller.status(), UploadStatus::Idle);
        assert!(!controller.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn resume_rejects_inconsistent_record() {
        init_dummy_tracing_subscriber();

        let record = ResumeRecord {
            session_id: "session-1".to_string(),
            file_name: "movie.mp4".to_string(),
            file_size_bytes: 25 * MIB,
            mime_type: "video/mp4".to_string(),
            chunk_size_bytes: 10 * MIB,
            total_parts: 4,
            folder: None,
            parts: vec![],
        };

        let result = UploadSessionController::resume(
            fast_config(),
            Box::new(ScriptedDestination::default()),
            create_upload_cancellation_token(),
            record,
        );
        assert!(matches!(
            result.err().unwrap().downcast_ref::<UploadError>(),
            Some(UploadError::ResumeMismatch(_))
        ));
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
