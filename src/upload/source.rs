use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::types::error::UploadError;

/// The bytes being uploaded. Parts are read lazily, one range at a time.
#[derive(Debug, Clone)]
pub enum UploadSource {
    File {
        path: PathBuf,
        file_name: String,
        size: u64,
    },
    Memory {
        file_name: String,
        data: Bytes,
    },
}

impl UploadSource {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("tokio::fs::metadata() failed. path={}", path.display()))?;
        if !metadata.is_file() {
            return Err(anyhow!(UploadError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            ))));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                anyhow!(UploadError::InvalidInput(format!(
                    "{} has no file name",
                    path.display()
                )))
            })?;

        Ok(UploadSource::File {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
        })
    }

    pub fn from_bytes(file_name: &str, data: Bytes) -> Self {
        UploadSource::Memory {
            file_name: file_name.to_string(),
            data,
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            UploadSource::File { file_name, .. } => file_name,
            UploadSource::Memory { file_name, .. } => file_name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            UploadSource::File { size, .. } => *size,
            UploadSource::Memory { data, .. } => data.len() as u64,
        }
    }

    /// The explicit type wins. Otherwise it is guessed from the file name extension.
    pub fn mime_type(&self, explicit: Option<&str>) -> String {
        match explicit {
            Some(mime_type) => mime_type.to_string(),
            None => mime_guess::from_path(self.file_name())
                .first_or_octet_stream()
                .to_string(),
        }
    }

    pub async fn read_part(&self, range: Range<u64>) -> Result<Bytes> {
        if self.size() < range.end || range.end < range.start {
            return Err(anyhow!(UploadError::InvalidInput(format!(
                "range {}..{} is outside of {} bytes",
                range.start,
                range.end,
                self.size()
            ))));
        }

        match self {
            UploadSource::Memory { data, .. } => {
                Ok(data.slice(range.start as usize..range.end as usize))
            }
            UploadSource::File { path, .. } => {
                let mut file = File::open(path)
                    .await
                    .with_context(|| format!("tokio::fs::File::open() failed. path={}", path.display()))?;
                file.seek(SeekFrom::Start(range.start))
                    .await
                    .context("tokio::fs::File::seek() failed.")?;

                let mut buffer = vec![0u8; (range.end - range.start) as usize];
                file.read_exact(&mut buffer)
                    .await
                    .context("tokio::fs::File::read_exact() failed.")?;

                Ok(Bytes::from(buffer))
            }
        }
    }
}
