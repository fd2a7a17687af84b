use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::trace;

use crate::types::error::UploadError;
use crate::types::{CompletedPart, UploadSession};

/// Durable snapshot of an interrupted session, enough to resume it in another process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub session_id: String,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub mime_type: String,
    pub chunk_size_bytes: u64,
    pub total_parts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default)]
    pub parts: Vec<CompletedPart>,
}

impl ResumeRecord {
    /// `None` until the destination has assigned a session id.
    pub fn from_session(session: &UploadSession) -> Option<Self> {
        Some(Self {
            session_id: session.session_id()?.to_string(),
            file_name: session.file_name.clone(),
            file_size_bytes: session.file_size_bytes,
            mime_type: session.mime_type.clone(),
            chunk_size_bytes: session.chunk_size_bytes,
            total_parts: session.total_parts,
            folder: session.folder.clone(),
            parts: session.finalize_parts(),
        })
    }

    pub fn check_same_file(&self, file_name: &str, file_size_bytes: u64) -> Result<(), UploadError> {
        if self.file_name != file_name || self.file_size_bytes != file_size_bytes {
            return Err(UploadError::ResumeMismatch(format!(
                "recorded {} ({} bytes), given {} ({} bytes)",
                self.file_name, self.file_size_bytes, file_name, file_size_bytes
            )));
        }
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read(path)
            .await
            .with_context(|| format!("tokio::fs::read() failed. path={}", path.display()))?;

        serde_json::from_slice(&json).map_err(|e| {
            anyhow!(UploadError::ResumeMismatch(format!(
                "{} is not a resume record: {e}",
                path.display()
            )))
        })
    }

    /// Writes to a temporary file next to `path` and renames it over `path`.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("serde_json::to_vec_pretty() failed.")?;
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_atomically(&path, &json))
            .await
            .context("tokio::task::spawn_blocking() failed.")?
    }

    pub async fn remove(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("tokio::fs::remove_file() failed. path={}", path.display())),
        }
    }
}

fn write_atomically(path: &Path, json: &[u8]) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut temp_file =
        NamedTempFile::new_in(&directory).context("NamedTempFile::new_in failed.")?;
    temp_file
        .write_all(json)
        .context("NamedTempFile::write_all() failed.")?;
    temp_file
        .as_file()
        .sync_all()
        .context("std::fs::File::sync_all() failed.")?;
    temp_file
        .persist(path)
        .context("NamedTempFile::persist() failed.")?;

    trace!(path = %path.display(), "resume record has been saved.");
    Ok(())
}
