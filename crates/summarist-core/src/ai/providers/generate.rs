use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{provider_error, ProviderKind, StreamDecoder, SummaryProvider};
use crate::config::ProviderConfig;
use crate::{Error, Result};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
}

/// Generate API (`/api/generate`), newline-delimited JSON when streaming
pub struct GenerateProvider;

impl SummaryProvider for GenerateProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn path(&self) -> &'static str {
        "/api/generate"
    }

    fn build_body(&self, config: &ProviderConfig, markdown: &str, stream: bool) -> Result<Value> {
        let request = GenerateRequest {
            model: &config.model,
            system: &config.system_prompt,
            prompt: markdown,
            stream,
        };

        Ok(serde_json::to_value(request)?)
    }

    fn stream_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(LineDecoder::default())
    }

    fn parse_whole(&self, body: &[u8]) -> Result<String> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {}", e)))?;
        if let Some(err) = provider_error(&value) {
            return Err(err);
        }

        value
            .get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::MalformedResponse("response has no `response` field".to_string()))
    }
}

/// Buffers raw bytes and decodes one JSON object per complete line
#[derive(Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    fn decode_line(line: &[u8]) -> Result<Option<String>> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed response line");
                return Ok(None);
            }
        };

        if let Some(err) = provider_error(&value) {
            return Err(err);
        }

        match serde_json::from_value::<GenerateChunk>(value) {
            Ok(chunk) => Ok(chunk.response.filter(|r| !r.is_empty())),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unexpected response line");
                Ok(None)
            }
        }
    }
}

impl StreamDecoder for LineDecoder {
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);
        let mut fragments = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(text) = Self::decode_line(&line)? {
                fragments.push(text);
            }
        }

        Ok(fragments)
    }

    fn finish(&mut self) -> Result<Vec<String>> {
        // An unterminated final line is only used if it parses on its own
        let rest = std::mem::take(&mut self.buffer);
        let trimmed = String::from_utf8_lossy(&rest);
        if trimmed.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(trimmed.trim()) {
            Ok(_) => Ok(Self::decode_line(&rest)?.into_iter().collect()),
            Err(_) => {
                tracing::debug!(bytes = rest.len(), "Discarding partial response line");
                Ok(Vec::new())
            }
        }
    }
}
