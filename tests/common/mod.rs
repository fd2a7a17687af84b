#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::Receiver;
use async_trait::async_trait;
use bytes::Bytes;

use chunkup::config::Config;
use chunkup::destination::{
    Destination, DestinationTrait, InitiateRequest, InitiateResponse, StatusResponse,
};
use chunkup::types::{CompletedPart, MIB, PartDestination, UploadEvent, UploadStatus};
use chunkup::upload::source::UploadSource;

pub const SESSION_ID: &str = "session-e2e";
pub const FILE_NAME: &str = "lecture.mp4";
pub const MASTER_URL: &str = "https://cdn.local/lecture/master.m3u8";

/// Every call the session controller made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initiate,
    ChunkUrls(Vec<u32>),
    PutPart(u32),
    MarkUploaded(Vec<u32>),
    Complete(Vec<u32>),
    Status,
    Cancel,
}

#[derive(Default)]
pub struct FakeState {
    pub calls: Vec<Call>,
    pub initiate_requests: Vec<InitiateRequest>,
    pub fail_initiate: bool,
    /// Remaining failures per part number.
    pub put_failures: HashMap<u32, u32>,
    pub put_attempts: HashMap<u32, u32>,
    pub put_delay: Duration,
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub aborted_puts: u32,
    pub completed_parts: Option<Vec<CompletedPart>>,
    /// The last entry repeats forever.
    pub statuses: VecDeque<StatusResponse>,
}

/// In-memory destination service with scripted failures.
#[derive(Clone, Default)]
pub struct FakeDestination {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeDestination {
    pub fn new() -> Self {
        let destination = Self::default();
        destination.state.lock().unwrap().statuses = [completed_status()].into();
        destination
    }

    pub fn boxed(&self) -> Destination {
        Box::new(self.clone())
    }

    pub fn fail_part(&self, part_number: u32, times: u32) {
        self.state
            .lock()
            .unwrap()
            .put_failures
            .insert(part_number, times);
    }

    pub fn set_put_delay(&self, delay: Duration) {
        self.state.lock().unwrap().put_delay = delay;
    }

    pub fn set_statuses(&self, statuses: Vec<StatusResponse>) {
        self.state.lock().unwrap().statuses = statuses.into();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn put_attempts(&self, part_number: u32) -> u32 {
        self.state
            .lock()
            .unwrap()
            .put_attempts
            .get(&part_number)
            .copied()
            .unwrap_or_default()
    }

    pub fn completed_part_numbers(&self) -> Option<Vec<u32>> {
        self.state
            .lock()
            .unwrap()
            .completed_parts
            .as_ref()
            .map(|parts| parts.iter().map(|part| part.part_number).collect())
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

pub fn status(status: &str) -> StatusResponse {
    StatusResponse {
        status: status.to_string(),
        ..Default::default()
    }
}

pub fn completed_status() -> StatusResponse {
    serde_json::from_value(serde_json::json!({
        "status": "COMPLETED",
        "outputs": { "master": MASTER_URL, "720p": "https://cdn.local/lecture/720p.m3u8" }
    }))
    .unwrap()
}

struct InFlightGuard {
    state: Arc<Mutex<FakeState>>,
    finished: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        if !self.finished {
            state.aborted_puts += 1;
        }
    }
}

#[async_trait]
impl DestinationTrait for FakeDestination {
    async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse> {
        self.record(Call::Initiate);
        let mut state = self.state.lock().unwrap();
        state.initiate_requests.push(request.clone());
        if state.fail_initiate {
            return Err(anyhow!("initiate failed with status 500"));
        }

        Ok(InitiateResponse {
            session_id: SESSION_ID.to_string(),
        })
    }

    async fn chunk_urls(
        &self,
        _session_id: &str,
        part_numbers: &[u32],
    ) -> Result<Vec<PartDestination>> {
        self.record(Call::ChunkUrls(part_numbers.to_vec()));

        Ok(part_numbers
            .iter()
            .map(|part_number| PartDestination {
                part_number: *part_number,
                upload_url: format!("https://storage.local/{SESSION_ID}/{part_number}"),
            })
            .collect())
    }

    async fn put_part(&self, upload_url: &str, _body: Bytes) -> Result<String> {
        let part_number: u32 = upload_url
            .rsplit('/')
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| anyhow!("unexpected url {upload_url}"))?;
        self.record(Call::PutPart(part_number));

        let delay = {
            let mut state = self.state.lock().unwrap();
            *state.put_attempts.entry(part_number).or_default() += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.put_delay
        };
        let mut guard = InFlightGuard {
            state: self.state.clone(),
            finished: false,
        };

        tokio::time::sleep(delay).await;
        guard.finished = true;
        drop(guard);

        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.put_failures.get_mut(&part_number) {
            if 0 < *remaining {
                *remaining -= 1;
                return Err(anyhow!("connection reset by peer"));
            }
        }

        Ok(format!("\"etag-{part_number}\""))
    }

    async fn mark_uploaded(&self, _session_id: &str, parts: &[CompletedPart]) -> Result<()> {
        self.record(Call::MarkUploaded(
            parts.iter().map(|part| part.part_number).collect(),
        ));
        Ok(())
    }

    async fn complete(&self, _session_id: &str, parts: &[CompletedPart]) -> Result<()> {
        self.record(Call::Complete(
            parts.iter().map(|part| part.part_number).collect(),
        ));
        self.state.lock().unwrap().completed_parts = Some(parts.to_vec());
        Ok(())
    }

    async fn status(&self, _session_id: &str) -> Result<StatusResponse> {
        self.record(Call::Status);
        let mut state = self.state.lock().unwrap();
        let next = if 1 < state.statuses.len() {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        };

        next.ok_or_else(|| anyhow!("status failed with status 404"))
    }

    async fn cancel(&self, _session_id: &str) -> Result<()> {
        self.record(Call::Cancel);
        Ok(())
    }
}

pub struct TestHelper;

impl TestHelper {
    pub fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }

    pub fn config() -> Config {
        let mut config = Config::default();
        config.transfer_config.chunk_size = 10 * MIB;
        config
    }

    /// Zero-filled in-memory source named `lecture.mp4`.
    pub fn source(size: u64) -> UploadSource {
        UploadSource::from_bytes(FILE_NAME, Bytes::from(vec![0_u8; size as usize]))
    }

    pub fn drain_events(event_receiver: &Receiver<UploadEvent>) -> Vec<UploadEvent> {
        let mut events = vec![];
        while let Ok(event) = event_receiver.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn statuses(events: &[UploadEvent]) -> Vec<UploadStatus> {
        events
            .iter()
            .filter_map(|event| match event {
                UploadEvent::StatusChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn progress(events: &[UploadEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|event| match event {
                UploadEvent::Progress(snapshot) => Some(snapshot.progress_percent),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_events(events: &[UploadEvent]) -> usize {
        events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    UploadEvent::Completed(_) | UploadEvent::Failed { .. } | UploadEvent::Cancelled
                )
            })
            .count()
    }
}
