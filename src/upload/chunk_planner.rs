use std::collections::BTreeSet;
use std::ops::Range;

use crate::types::error::UploadError;

/// Fixed-size partitioning of a file into 1-indexed parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size_bytes: u64,
    chunk_size_bytes: u64,
    total_parts: u32,
}

impl ChunkPlan {
    pub fn new(file_size_bytes: u64, chunk_size_bytes: u64) -> Result<Self, UploadError> {
        if file_size_bytes == 0 {
            return Err(UploadError::InvalidInput(
                "file size must be greater than zero".to_string(),
            ));
        }
        if chunk_size_bytes == 0 {
            return Err(UploadError::InvalidInput(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        let total_parts = u32::try_from(file_size_bytes.div_ceil(chunk_size_bytes))
            .map_err(|_| {
                UploadError::InvalidInput(format!(
                    "{file_size_bytes} bytes cannot be split into {chunk_size_bytes} byte parts"
                ))
            })?;

        Ok(Self {
            file_size_bytes,
            chunk_size_bytes,
            total_parts,
        })
    }

    pub fn file_size_bytes(&self) -> u64 {
        self.file_size_bytes
    }

    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_bytes
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    /// Byte range `[start, end)` of `part_number`, or `None` outside `1..=total_parts`.
    pub fn range(&self, part_number: u32) -> Option<Range<u64>> {
        if part_number == 0 || self.total_parts < part_number {
            return None;
        }

        let start = (part_number as u64 - 1) * self.chunk_size_bytes;
        let end = (start + self.chunk_size_bytes).min(self.file_size_bytes);
        Some(start..end)
    }

    pub fn pending_parts(&self, uploaded: &BTreeSet<u32>) -> Vec<u32> {
        (1..=self.total_parts)
            .filter(|part_number| !uploaded.contains(part_number))
            .collect()
    }
}
