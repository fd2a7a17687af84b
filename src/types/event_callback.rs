use async_trait::async_trait;
use bitflags::bitflags;

use crate::types::{UploadEvent, UploadStatus};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct EventType: u64 {
        const UNDEFINED = 0u64;
        const STATUS_CHANGE = 1u64 << 1;
        const PART_UPLOADED = 1u64 << 2;
        const PART_RETRY = 1u64 << 3;
        const PROGRESS = 1u64 << 4;
        const SESSION_COMPLETE = 1u64 << 5;
        const SESSION_FAILED = 1u64 << 6;
        const SESSION_CANCEL = 1u64 << 7;

        const ALL_EVENTS  = !0;
    }
}

#[derive(Default, Debug, Clone)]
pub struct EventData {
    pub event_type: EventType,
    pub session_id: Option<String>,
    pub status: Option<UploadStatus>,
    pub part_number: Option<u32>,
    pub attempt: Option<u32>,
    pub bytes: Option<u64>,
    pub progress_percent: Option<f64>,
    pub master_url: Option<String>,
    pub message: Option<String>,
}

impl EventData {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            ..Default::default()
        }
    }

    pub fn from_upload_event(session_id: Option<&str>, event: &UploadEvent) -> Self {
        let mut event_data = match event {
            UploadEvent::StatusChanged { to, .. } => {
                let mut event_data = EventData::new(EventType::STATUS_CHANGE);
                event_data.status = Some(*to);
                event_data
            }
            UploadEvent::PartUploaded { part_number, bytes } => {
                let mut event_data = EventData::new(EventType::PART_UPLOADED);
                event_data.part_number = Some(*part_number);
                event_data.bytes = Some(*bytes);
                event_data
            }
            UploadEvent::PartRetry {
                part_number,
                attempt,
                error,
            } => {
                let mut event_data = EventData::new(EventType::PART_RETRY);
                event_data.part_number = Some(*part_number);
                event_data.attempt = Some(*attempt);
                event_data.message = Some(error.clone());
                event_data
            }
            UploadEvent::Progress(snapshot) => {
                let mut event_data = EventData::new(EventType::PROGRESS);
                event_data.status = Some(snapshot.status);
                event_data.bytes = Some(snapshot.uploaded_bytes);
                event_data.progress_percent = Some(snapshot.progress_percent);
                event_data
            }
            UploadEvent::Completed(outputs) => {
                let mut event_data = EventData::new(EventType::SESSION_COMPLETE);
                event_data.status = Some(UploadStatus::Completed);
                event_data.master_url = outputs.master.clone();
                event_data
            }
            UploadEvent::Failed { error_detail } => {
                let mut event_data = EventData::new(EventType::SESSION_FAILED);
                event_data.status = Some(UploadStatus::Failed);
                event_data.message = Some(error_detail.clone());
                event_data
            }
            UploadEvent::Cancelled => {
                let mut event_data = EventData::new(EventType::SESSION_CANCEL);
                event_data.status = Some(UploadStatus::Cancelled);
                event_data
            }
        };
        event_data.session_id = session_id.map(|id| id.to_string());

        event_data
    }
}

#[async_trait]
pub trait EventCallback {
    // Callbacks are invoked serially from the session controller and must return quickly.
    async fn on_event(&mut self, event_data: EventData);
}
