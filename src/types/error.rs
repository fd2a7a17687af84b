use anyhow::Error;
use thiserror::Error;

use crate::types::UploadStatus;

#[derive(Error, Debug, PartialEq)]
pub enum UploadError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("a zero-byte file cannot be uploaded")]
    EmptyFile,
    #[error("file size {size} bytes exceeds the limit of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },
    #[error("mime type {mime_type} is not accepted (expected {accepted_prefix}*)")]
    UnsupportedMimeType {
        mime_type: String,
        accepted_prefix: String,
    },
    #[error("failed to initiate the upload session: {0}")]
    InitiateFailed(String),
    #[error("failed to get upload urls for parts {part_numbers:?}: {reason}")]
    ChunkUrlsFailed {
        part_numbers: Vec<u32>,
        reason: String,
    },
    #[error("upload url for part {0} is missing in the response")]
    MissingUploadUrl(u32),
    #[error("completion token(ETag) is missing in the response")]
    MissingCompletionToken,
    #[error("part {part_number} failed after {attempts} attempts: {reason}")]
    PartRetryExhausted {
        part_number: u32,
        attempts: u32,
        reason: String,
    },
    #[error("failed to finalize the upload: {0}")]
    FinalizeFailed(String),
    #[error("processing did not finish within {0} seconds")]
    PollTimeout(u64),
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
    #[error("resume record does not match the file: {0}")]
    ResumeMismatch(String),
    #[error("the session has been cancelled and cannot be resumed")]
    SessionCancelled,
    #[error("the session is already {0}")]
    InvalidState(UploadStatus),
    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Validation errors are raised before any network call.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            UploadError::InvalidInput(_)
                | UploadError::EmptyFile
                | UploadError::FileTooLarge { .. }
                | UploadError::UnsupportedMimeType { .. }
                | UploadError::ResumeMismatch(_)
        )
    }
}

pub fn is_cancelled_error(e: &Error) -> bool {
    matches!(e.downcast_ref::<UploadError>(), Some(UploadError::Cancelled))
}

/// Human-readable reason for `error_detail`. Never a backtrace.
pub fn error_detail(e: &Error) -> String {
    if let Some(upload_error) = e.downcast_ref::<UploadError>() {
        return upload_error.to_string();
    }

    format!("{e:#}")
}
