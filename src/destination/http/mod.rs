use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ETAG;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::config::DestinationConfig;
use crate::destination::{
    ChunkUrlsRequest, ChunkUrlsResponse, Destination, DestinationTrait, InitiateRequest,
    InitiateResponse, SessionPartsRequest, SessionRequest, StatusResponse,
};
use crate::types::error::UploadError;
use crate::types::{BearerToken, CompletedPart, PartDestination};

mod client_builder;

/// JSON-over-HTTP destination service.
///
/// Session endpoints live under `endpoint_url` and are called with the bearer credential.
/// Part bodies go straight to the pre-signed URLs without it.
#[derive(Clone, Debug)]
pub struct HttpDestination {
    client: Client,
    endpoint_url: String,
    bearer_token: BearerToken,
}

impl HttpDestination {
    pub fn new(destination_config: &DestinationConfig) -> Result<Self> {
        Url::parse(&destination_config.endpoint_url)
            .with_context(|| format!("invalid endpoint url: {}", destination_config.endpoint_url))?;

        Ok(Self {
            client: destination_config.create_client()?,
            endpoint_url: destination_config
                .endpoint_url
                .trim_end_matches('/')
                .to_string(),
            bearer_token: destination_config.bearer_token.clone(),
        })
    }

    pub fn boxed_new(destination_config: &DestinationConfig) -> Result<Destination> {
        Ok(Box::new(Self::new(destination_config)?))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> Result<Response> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .with_context(|| format!("reqwest::RequestBuilder::send() failed. ({operation})"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "{operation} failed with status {status}: {}",
                body.trim()
            ));
        }

        trace!(operation = operation, status = status.as_u16(), "response received.");
        Ok(response)
    }

    async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R> {
        let response = self
            .send(self.client.post(self.endpoint(path)).json(body), path)
            .await?;

        response
            .json::<R>()
            .await
            .with_context(|| format!("reqwest::Response::json() failed. ({path})"))
    }

    async fn post_json_without_response<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<()> {
        self.send(self.client.post(self.endpoint(path)).json(body), path)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DestinationTrait for HttpDestination {
    async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse> {
        let response: InitiateResponse = self.post_json("initiate", request).await?;
        debug!(session_id = response.session_id, "session initiated.");

        Ok(response)
    }

    async fn chunk_urls(
        &self,
        session_id: &str,
        part_numbers: &[u32],
    ) -> Result<Vec<PartDestination>> {
        let request = ChunkUrlsRequest {
            session_id: session_id.to_string(),
            part_numbers: part_numbers.to_vec(),
        };
        let response: ChunkUrlsResponse = self.post_json("chunk-urls", &request).await?;

        Ok(response.parts)
    }

    async fn put_part(&self, upload_url: &str, body: Bytes) -> Result<String> {
        let response = self
            .client
            .put(upload_url)
            .body(body)
            .send()
            .await
            .context("reqwest::RequestBuilder::send() failed. (put part)")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("put part failed with status {status}"));
        }

        response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
            .ok_or_else(|| anyhow!(UploadError::MissingCompletionToken))
    }

    async fn mark_uploaded(&self, session_id: &str, parts: &[CompletedPart]) -> Result<()> {
        let request = SessionPartsRequest {
            session_id: session_id.to_string(),
            parts: parts.to_vec(),
        };
        self.post_json_without_response("mark-uploaded", &request)
            .await
    }

    async fn complete(&self, session_id: &str, parts: &[CompletedPart]) -> Result<()> {
        let request = SessionPartsRequest {
            session_id: session_id.to_string(),
            parts: parts.to_vec(),
        };
        self.post_json_without_response("complete", &request).await
    }

    async fn status(&self, session_id: &str) -> Result<StatusResponse> {
        let path = format!("status/{session_id}");
        let response = self
            .send(self.client.get(self.endpoint(&path)), "status")
            .await?;

        response
            .json::<StatusResponse>()
            .await
            .context("reqwest::Response::json() failed. (status)")
    }

    async fn cancel(&self, session_id: &str) -> Result<()> {
        let request = SessionRequest {
            session_id: session_id.to_string(),
        };
        self.post_json_without_response("cancel", &request).await
    }
}
