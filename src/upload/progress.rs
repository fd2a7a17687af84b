use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use indicatif::{HumanBytes, HumanDuration};
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::time::Instant;

use crate::types::{COMPLETED_PROGRESS, SessionSnapshot};

pub const THROUGHPUT_WINDOW_SIZE: usize = 10;
const UNKNOWN: &str = "unknown";

/// Cumulative uploaded bytes observed at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    pub at: Instant,
    pub uploaded_bytes: u64,
}

/// Bounded ring of the most recent throughput samples.
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    samples: VecDeque<ThroughputSample>,
    capacity: usize,
}

impl Default for ThroughputWindow {
    fn default() -> Self {
        Self::new(THROUGHPUT_WINDOW_SIZE)
    }
}

impl ThroughputWindow {
    pub fn new(capacity: usize) -> Self {
        // One more sample than rates so that a full window yields `capacity` rates.
        let capacity = capacity.max(1) + 1;
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, at: Instant, uploaded_bytes: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(ThroughputSample { at, uploaded_bytes });
    }

    pub fn samples(&self) -> &VecDeque<ThroughputSample> {
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub percent: f64,
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub current_part: u32,
    pub total_parts: u32,
    pub bytes_per_sec: Option<f64>,
    pub eta: Option<Duration>,
}

impl ProgressView {
    pub fn uploaded_human(&self) -> String {
        HumanBytes(self.uploaded_bytes).to_string()
    }

    pub fn total_human(&self) -> String {
        HumanBytes(self.total_bytes).to_string()
    }

    pub fn throughput_human(&self) -> String {
        match self.bytes_per_sec {
            Some(bytes_per_sec) => format!("{}/s", HumanBytes(bytes_per_sec as u64)),
            None => UNKNOWN.to_string(),
        }
    }

    pub fn eta_human(&self) -> String {
        match self.eta {
            Some(eta) => HumanDuration(eta).to_string(),
            None => UNKNOWN.to_string(),
        }
    }
}

impl fmt::Display for ProgressView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3.0}% | {} / {} | part {}/{} | {} | eta {}",
            self.percent,
            self.uploaded_human(),
            self.total_human(),
            self.current_part,
            self.total_parts,
            self.throughput_human(),
            self.eta_human()
        )
    }
}

/// Pure read-side view over a session snapshot.
pub struct ProgressProjector;

impl ProgressProjector {
    pub fn project(snapshot: &SessionSnapshot, window: &ThroughputWindow) -> ProgressView {
        let percent = if snapshot.progress_percent.is_finite() {
            snapshot.progress_percent.clamp(0.0, COMPLETED_PROGRESS)
        } else {
            0.0
        };

        let uploaded_bytes = snapshot.uploaded_bytes.min(snapshot.file_size_bytes);
        let bytes_per_sec = smoothed_bytes_per_sec(window);
        let remaining_bytes = snapshot.file_size_bytes - uploaded_bytes;

        let eta = if remaining_bytes == 0 && 0 < snapshot.file_size_bytes {
            Some(Duration::ZERO)
        } else {
            bytes_per_sec
                .and_then(|bytes_per_sec| {
                    Duration::try_from_secs_f64(remaining_bytes as f64 / bytes_per_sec).ok()
                })
        };

        ProgressView {
            percent,
            uploaded_bytes,
            total_bytes: snapshot.file_size_bytes,
            current_part: snapshot.next_part.unwrap_or(snapshot.total_parts),
            total_parts: snapshot.total_parts,
            bytes_per_sec,
            eta,
        }
    }
}

fn smoothed_bytes_per_sec(window: &ThroughputWindow) -> Option<f64> {
    let mut moving_average = SumTreeSMA::<f64, f64, THROUGHPUT_WINDOW_SIZE>::new();

    let samples = window.samples();
    for (previous, current) in samples.iter().zip(samples.iter().skip(1)) {
        let elapsed = current.at.saturating_duration_since(previous.at).as_secs_f64();
        if elapsed <= 0.0 {
            continue;
        }
        let bytes = current.uploaded_bytes.saturating_sub(previous.uploaded_bytes) as f64;
        moving_average.add_sample(bytes / elapsed);
    }

    if moving_average.get_num_samples() == 0 {
        return None;
    }

    let average = moving_average.get_average();
    (average.is_finite() && 0.0 < average).then_some(average)
}
