use std::sync::Arc;
use std::time::Duration;

use super::providers::{StreamDecoder, SummaryProvider};
use super::retry::RetryPolicy;
use super::transport::{read_to_end, ChunkStream, HttpTransport, SummaryRequest, Transport};
use crate::config::{AppConfig, ProviderConfig};
use crate::{Error, Result};

/// AI summarizer wrapping the configured provider and transport
pub struct Summarizer {
    config: ProviderConfig,
    provider: Arc<dyn SummaryProvider>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl Summarizer {
    /// Create a summarizer talking HTTP to the configured endpoint
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self::with_transport(config, Arc::new(HttpTransport::new()?)))
    }

    pub fn with_transport(config: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        let provider = config.provider.provider.provider();
        tracing::debug!(
            provider = %provider.kind(),
            endpoint = %provider.endpoint(&config.provider.base_url),
            "Summarizer ready"
        );

        Self {
            provider,
            config: config.provider.clone(),
            transport,
            retry: RetryPolicy::from(&config.interactive),
        }
    }

    /// Fails with `Error::Config` when a required provider setting is missing
    pub fn ensure_configured(&self) -> Result<()> {
        self.config.validate()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn build_request(&self, markdown: &str, stream: bool) -> Result<SummaryRequest> {
        Ok(SummaryRequest {
            url: self.provider.endpoint(&self.config.base_url),
            api_key: self.config.api_key.clone(),
            body: self.provider.build_body(&self.config, markdown, stream)?,
        })
    }

    /// Open a streamed response; resolves once a 2xx status is in
    pub async fn open_stream(&self, markdown: &str) -> Result<(Box<dyn ChunkStream>, Box<dyn StreamDecoder>)> {
        let request = self.build_request(markdown, true)?;
        let stream = self.transport.send(&request, None).await?;
        Ok((stream, self.provider.stream_decoder()))
    }

    /// Request a complete summary in one response, bounded by `timeout`
    pub async fn summarize(&self, markdown: &str, timeout: Duration) -> Result<String> {
        self.ensure_configured()?;
        let request = self.build_request(markdown, false)?;

        let call = async {
            let mut stream = self.transport.send(&request, Some(timeout)).await?;
            let body = read_to_end(stream.as_mut()).await?;
            self.provider.parse_whole(&body)
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }
}
