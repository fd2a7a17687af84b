use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

use crate::types::error::UploadError;

pub mod error;
pub mod event_callback;
pub mod event_manager;
pub mod token;

pub const MIB: u64 = 1024 * 1024;

// Raw part transfer fills the first 90% of the visual progress space.
// The rest belongs to finalize and post-processing.
pub const UPLOAD_PROGRESS_CEILING: f64 = 90.0;
pub const PROCESSING_PROGRESS_CEILING: f64 = 99.0;
pub const COMPLETED_PROGRESS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Idle,
    Initiating,
    Uploading,
    Completing,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Idle => "idle",
            UploadStatus::Initiating => "initiating",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completing => "completing",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
            UploadStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A part accepted by the storage layer, identified by the entity tag it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    pub token: String,
}

/// A pre-signed, time-limited destination for exactly one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartDestination {
    pub part_number: u32,
    pub upload_url: String,
}

/// Artifact descriptor reported by the processing pipeline once it has finished.
/// `master` is the primary reference, `variants` holds per-resolution outputs.
///
/// Entries that are not strings (`null`, numbers, nested objects) are dropped on decode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawProcessingOutputs")]
pub struct ProcessingOutputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(flatten)]
    pub variants: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawProcessingOutputs {
    #[serde(default)]
    master: serde_json::Value,
    #[serde(flatten)]
    variants: BTreeMap<String, serde_json::Value>,
}

impl From<RawProcessingOutputs> for ProcessingOutputs {
    fn from(raw: RawProcessingOutputs) -> Self {
        ProcessingOutputs {
            master: raw.master.as_str().map(str::to_string),
            variants: raw
                .variants
                .into_iter()
                .filter_map(|(name, value)| match value {
                    serde_json::Value::String(reference) => Some((name, reference)),
                    _ => None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub session_id: String,
    pub outputs: ProcessingOutputs,
}

/// Discrete, totally ordered notifications emitted by the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    StatusChanged {
        from: UploadStatus,
        to: UploadStatus,
    },
    PartUploaded {
        part_number: u32,
        bytes: u64,
    },
    PartRetry {
        part_number: u32,
        attempt: u32,
        error: String,
    },
    Progress(SessionSnapshot),
    Completed(ProcessingOutputs),
    Failed {
        error_detail: String,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub status: UploadStatus,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub chunk_size_bytes: u64,
    pub total_parts: u32,
    pub uploaded_part_count: u32,
    pub uploaded_bytes: u64,
    pub next_part: Option<u32>,
    pub progress_percent: f64,
    pub error_detail: Option<String>,
}

/// One logical file transfer.
///
/// Only the session controller holds a mutable reference. Uploaded parts and their
/// completion tokens live in a single ordered map, so every uploaded part has exactly
/// one token and finalize order is ascending by construction.
#[derive(Debug, Clone, Default)]
pub struct UploadSession {
    pub file_name: String,
    pub file_size_bytes: u64,
    pub mime_type: String,
    pub chunk_size_bytes: u64,
    pub total_parts: u32,
    pub folder: Option<String>,
    session_id: Option<String>,
    part_tokens: BTreeMap<u32, String>,
    status: UploadStatus,
    progress_percent: f64,
    error_detail: Option<String>,
}

impl UploadSession {
    pub fn new(
        file_name: &str,
        file_size_bytes: u64,
        mime_type: &str,
        chunk_size_bytes: u64,
        total_parts: u32,
        folder: Option<String>,
    ) -> Self {
        Self {
            file_name: file_name.to_string(),
            file_size_bytes,
            mime_type: mime_type.to_string(),
            chunk_size_bytes,
            total_parts,
            folder,
            ..Default::default()
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn uploaded_parts(&self) -> BTreeSet<u32> {
        self.part_tokens.keys().copied().collect()
    }

    pub fn uploaded_part_count(&self) -> u32 {
        self.part_tokens.len() as u32
    }

    pub fn part_tokens(&self) -> &BTreeMap<u32, String> {
        &self.part_tokens
    }

    pub fn is_all_uploaded(&self) -> bool {
        0 < self.total_parts && self.uploaded_part_count() == self.total_parts
    }

    pub fn next_pending_part(&self) -> Option<u32> {
        (1..=self.total_parts).find(|part_number| !self.part_tokens.contains_key(part_number))
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.part_tokens
            .keys()
            .map(|part_number| self.part_length(*part_number))
            .sum()
    }

    pub fn part_length(&self, part_number: u32) -> u64 {
        if part_number == 0 || self.total_parts < part_number || self.chunk_size_bytes == 0 {
            return 0;
        }
        let start = (part_number as u64 - 1) * self.chunk_size_bytes;
        let end = (part_number as u64 * self.chunk_size_bytes).min(self.file_size_bytes);
        end.saturating_sub(start)
    }

    /// `{part_number, token}` pairs sorted ascending by part number.
    pub fn finalize_parts(&self) -> Vec<CompletedPart> {
        self.part_tokens
            .iter()
            .map(|(part_number, token)| CompletedPart {
                part_number: *part_number,
                token: token.clone(),
            })
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            status: self.status,
            file_name: self.file_name.clone(),
            file_size_bytes: self.file_size_bytes,
            chunk_size_bytes: self.chunk_size_bytes,
            total_parts: self.total_parts,
            uploaded_part_count: self.uploaded_part_count(),
            uploaded_bytes: self.uploaded_bytes(),
            next_part: self.next_pending_part(),
            progress_percent: self.progress_percent,
            error_detail: self.error_detail.clone(),
        }
    }

    pub(crate) fn set_session_id(&mut self, session_id: &str) {
        self.session_id = Some(session_id.to_string());
    }

    /// Returns the previous status.
    pub(crate) fn set_status(&mut self, status: UploadStatus) -> UploadStatus {
        std::mem::replace(&mut self.status, status)
    }

    pub(crate) fn set_error(&mut self, error_detail: &str) {
        self.error_detail = Some(error_detail.to_string());
    }

    pub(crate) fn clear_error(&mut self) {
        self.error_detail = None;
    }

    /// Progress never moves backwards within a session.
    pub(crate) fn advance_progress(&mut self, percent: f64) {
        if percent.is_finite() {
            self.progress_percent = self.progress_percent.max(percent.min(COMPLETED_PROGRESS));
        }
    }

    pub(crate) fn upload_progress(&self) -> f64 {
        if self.total_parts == 0 {
            return 0.0;
        }
        self.uploaded_part_count() as f64 / self.total_parts as f64 * UPLOAD_PROGRESS_CEILING
    }

    /// Returns `Ok(false)` when the part was already recorded.
    pub(crate) fn record_part(&mut self, part: CompletedPart) -> Result<bool, UploadError> {
        if part.part_number == 0 || self.total_parts < part.part_number {
            return Err(UploadError::InvalidInput(format!(
                "part number {} is out of range 1..={}",
                part.part_number, self.total_parts
            )));
        }
        if self.status.is_terminal() {
            return Err(UploadError::InvalidState(self.status));
        }
        if self.part_tokens.contains_key(&part.part_number) {
            return Ok(false);
        }

        self.part_tokens.insert(part.part_number, part.token);
        let progress = self.upload_progress();
        self.advance_progress(progress);

        Ok(true)
    }

    pub(crate) fn restore_parts(&mut self, parts: &[CompletedPart]) -> Result<(), UploadError> {
        for part in parts {
            self.record_part(part.clone())?;
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.session_id = None;
        self.part_tokens.clear();
        self.status = UploadStatus::Idle;
        self.progress_percent = 0.0;
        self.error_detail = None;
    }
}

/// Bearer credential for the destination service. Never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BearerToken {
    pub token: Option<String>,
}

impl Debug for BearerToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("BearerToken");
        let token = self.token.as_ref().map_or("None", |_| "** redacted **");
        keys.field("token", &token);
        keys.finish()
    }
}
