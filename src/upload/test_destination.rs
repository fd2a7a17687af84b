use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;

use crate::destination::{DestinationTrait, InitiateRequest, InitiateResponse, StatusResponse};
use crate::types::{CompletedPart, PartDestination};

#[derive(Default)]
pub(crate) struct ScriptState {
    pub initiate_requests: Vec<InitiateRequest>,
    pub chunk_url_requests: Vec<Vec<u32>>,
    pub fail_chunk_urls: bool,
    /// Remaining failures per part number.
    pub put_failures: HashMap<u32, u32>,
    pub put_attempts: HashMap<u32, u32>,
    pub put_delay: Duration,
    pub put_delays: HashMap<u32, Duration>,
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub marked_parts: Vec<u32>,
    pub completed_parts: Option<Vec<CompletedPart>>,
    /// The last entry repeats forever.
    pub statuses: VecDeque<Result<StatusResponse, String>>,
    pub status_calls: u32,
    pub cancel_calls: u32,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedDestination {
    pub state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDestination {
    pub fn with_statuses(statuses: &[&str]) -> Self {
        let destination = Self::default();
        destination.state.lock().unwrap().statuses = statuses
            .iter()
            .map(|status| {
                Ok(StatusResponse {
                    status: status.to_string(),
                    ..Default::default()
                })
            })
            .collect();
        destination
    }

    pub fn part_url(part_number: u32) -> String {
        format!("https://storage.local/part/{part_number}")
    }
}

struct InFlightGuard {
    state: Arc<Mutex<ScriptState>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.lock().unwrap().in_flight -= 1;
    }
}

#[async_trait]
impl DestinationTrait for ScriptedDestination {
    async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse> {
        self.state
            .lock()
            .unwrap()
            .initiate_requests
            .push(request.clone());
        Ok(InitiateResponse {
            session_id: "session-1".to_string(),
        })
    }

    async fn chunk_urls(
        &self,
        _session_id: &str,
        part_numbers: &[u32],
    ) -> Result<Vec<PartDestination>> {
        let mut state = self.state.lock().unwrap();
        state.chunk_url_requests.push(part_numbers.to_vec());
        if state.fail_chunk_urls {
            return Err(anyhow!("chunk-urls failed with status 503"));
        }

        Ok(part_numbers
            .iter()
            .map(|part_number| PartDestination {
                part_number: *part_number,
                upload_url: Self::part_url(*part_number),
            })
            .collect())
    }

    async fn put_part(&self, upload_url: &str, _body: Bytes) -> Result<String> {
        let part_number: u32 = upload_url
            .rsplit('/')
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| anyhow!("unexpected url {upload_url}"))?;

        let delay = {
            let mut state = self.state.lock().unwrap();
            *state.put_attempts.entry(part_number).or_default() += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state
                .put_delays
                .get(&part_number)
                .copied()
                .unwrap_or(state.put_delay)
        };
        let _guard = InFlightGuard {
            state: self.state.clone(),
        };

        tokio::time::sleep(delay).await;

        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.put_failures.get_mut(&part_number) {
            if 0 < *remaining {
                *remaining -= 1;
                return Err(anyhow!("connection reset"));
            }
        }

        Ok(format!("\"etag-{part_number}\""))
    }

    async fn mark_uploaded(&self, _session_id: &str, parts: &[CompletedPart]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .marked_parts
            .extend(parts.iter().map(|part| part.part_number));
        Ok(())
    }

    async fn complete(&self, _session_id: &str, parts: &[CompletedPart]) -> Result<()> {
        self.state.lock().unwrap().completed_parts = Some(parts.to_vec());
        Ok(())
    }

    async fn status(&self, _session_id: &str) -> Result<StatusResponse> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        let next = if 1 < state.statuses.len() {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        };

        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("no status scripted")),
        }
    }

    async fn cancel(&self, _session_id: &str) -> Result<()> {
        self.state.lock().unwrap().cancel_calls += 1;
        Ok(())
    }
}
