use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{Error, Result};

/// One outbound summary request
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub url: String,
    pub api_key: String,
    pub body: serde_json::Value,
}

/// Sends a summary request and hands back the response body as it arrives.
///
/// `send` resolves once the response head is in and its status is 2xx; any
/// other status is reported as `Error::Status`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &SummaryRequest, timeout: Option<Duration>) -> Result<Box<dyn ChunkStream>>;
}

/// Incremental access to a response body
#[async_trait]
pub trait ChunkStream: Send {
    /// Next raw read, `None` once the body is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Read a whole body into memory
pub async fn read_to_end(stream: &mut dyn ChunkStream) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = stream.next_chunk().await? {
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("summarist/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &SummaryRequest, timeout: Option<Duration>) -> Result<Box<dyn ChunkStream>> {
        let mut builder = self
            .client
            .post(&request.url)
            .bearer_auth(&request.api_key)
            .json(&request.body);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::new(HttpChunkStream { response }))
    }
}

struct HttpChunkStream {
    response: reqwest::Response,
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.response.chunk().await?)
    }
}
