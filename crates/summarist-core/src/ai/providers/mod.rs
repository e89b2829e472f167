mod chat;
mod generate;

pub use chat::ChatCompletionProvider;
pub use generate::GenerateProvider;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::Result;

/// The closed set of wire formats a summary can be requested in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Chat-completion style: role-tagged messages, `choices[0].message.content`
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Generate style: flat system/prompt pair, `response`
    Ollama,
}

impl ProviderKind {
    pub fn provider(self) -> Arc<dyn SummaryProvider> {
        match self {
            ProviderKind::OpenAi => Arc::new(ChatCompletionProvider),
            ProviderKind::Ollama => Arc::new(GenerateProvider),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request shape and response decoding for one provider wire format
pub trait SummaryProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Path appended to the configured base URL
    fn path(&self) -> &'static str;

    /// Full endpoint URL for a base URL, tolerating a trailing slash
    fn endpoint(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim().trim_end_matches('/'), self.path())
    }

    /// JSON request body for converted article text
    fn build_body(&self, config: &ProviderConfig, markdown: &str, stream: bool) -> Result<serde_json::Value>;

    /// Fresh decoder for one streamed response
    fn stream_decoder(&self) -> Box<dyn StreamDecoder>;

    /// Extract the summary from a complete, non-streamed response body
    fn parse_whole(&self, body: &[u8]) -> Result<String>;
}

/// Incremental decoder turning raw response bytes into text fragments
pub trait StreamDecoder: Send {
    /// Feed one read from the response; returns the fragments it completed
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>>;

    /// Called once the response ended
    fn finish(&mut self) -> Result<Vec<String>>;
}

/// Surface an `{"error": ...}` object as a provider error
fn provider_error(value: &serde_json::Value) -> Option<crate::Error> {
    let error = value.get("error")?;
    if error.is_null() {
        return None;
    }
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    Some(crate::Error::AiProvider(message))
}
