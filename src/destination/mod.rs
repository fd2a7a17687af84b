use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};

use crate::types::{CompletedPart, PartDestination, ProcessingOutputs};

pub mod http;

pub type Destination = Box<dyn DestinationTrait + Send + Sync>;

/// The upload destination service: allocates sessions, hands out pre-signed part URLs,
/// assembles the multipart object and reports post-processing status.
#[async_trait]
pub trait DestinationTrait: DynClone {
    async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse>;
    async fn chunk_urls(&self, session_id: &str, part_numbers: &[u32])
    -> Result<Vec<PartDestination>>;
    /// Returns the completion token(ETag) assigned by the storage layer.
    async fn put_part(&self, upload_url: &str, body: Bytes) -> Result<String>;
    async fn mark_uploaded(&self, session_id: &str, parts: &[CompletedPart]) -> Result<()>;
    async fn complete(&self, session_id: &str, parts: &[CompletedPart]) -> Result<()>;
    async fn status(&self, session_id: &str) -> Result<StatusResponse>;
    async fn cancel(&self, session_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub file_name: String,
    pub file_size_bytes: u64,
    pub mime_type: String,
    pub total_parts: u32,
    pub chunk_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUrlsRequest {
    pub session_id: String,
    pub part_numbers: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUrlsResponse {
    pub parts: Vec<PartDestination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPartsRequest {
    pub session_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub outputs: Option<ProcessingOutputs>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    Completed(ProcessingOutputs),
    Failed(Option<String>),
    InProgress(String),
}

impl StatusResponse {
    pub fn processing_state(&self) -> ProcessingState {
        match self.status.to_ascii_uppercase().as_str() {
            "COMPLETED" => ProcessingState::Completed(self.outputs.clone().unwrap_or_default()),
            "FAILED" => ProcessingState::Failed(self.error_message.clone()),
            _ => ProcessingState::InProgress(self.status.clone()),
        }
    }
}
