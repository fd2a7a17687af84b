use std::fmt;
use std::sync::Arc;

use async_channel::Sender;
use tokio::sync::Mutex;

use crate::types::UploadEvent;
use crate::types::event_callback::{EventCallback, EventData, EventType};

#[derive(Clone)]
pub struct EventManager {
    pub event_callback: Option<Arc<Mutex<Box<dyn EventCallback + Send + Sync>>>>,
    pub event_flags: EventType,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager {
    pub fn new() -> Self {
        Self {
            event_callback: None,
            event_flags: EventType::ALL_EVENTS,
        }
    }

    pub fn register_callback<T: EventCallback + Send + Sync + 'static>(
        &mut self,
        events_flag: EventType,
        callback: T,
    ) {
        self.event_callback = Some(Arc::new(Mutex::new(Box::new(callback))));
        self.event_flags = events_flag;
    }

    pub fn is_callback_registered(&self) -> bool {
        self.event_callback.is_some()
    }

    pub async fn trigger_event(&self, event_data: EventData) {
        if let Some(callback) = &self.event_callback {
            if self.event_flags.contains(event_data.event_type) {
                callback.lock().await.on_event(event_data).await;
            }
        }
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("event_flags", &self.event_flags)
            .finish()
    }
}

/// Fan-out of one `UploadEvent` to the event channel and the registered callback.
#[derive(Clone, Debug)]
pub struct EventSink {
    sender: Sender<UploadEvent>,
    event_manager: EventManager,
}

impl EventSink {
    pub fn new(sender: Sender<UploadEvent>, event_manager: EventManager) -> Self {
        Self {
            sender,
            event_manager,
        }
    }

    pub async fn emit(&self, session_id: Option<&str>, event: UploadEvent) {
        if self.event_manager.is_callback_registered() {
            self.event_manager
                .trigger_event(EventData::from_upload_event(session_id, &event))
                .await;
        }

        // The receiver may have been dropped by a caller that is not interested in events.
        let _ = self.sender.send(event).await;
    }

    pub fn close(&self) {
        self.sender.close();
    }
}
