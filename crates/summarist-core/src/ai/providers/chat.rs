use serde::Serialize;
use serde_json::Value;

use super::{provider_error, ProviderKind, StreamDecoder, SummaryProvider};
use crate::config::ProviderConfig;
use crate::{Error, Result};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_completion_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat-completion API (`/chat/completions`)
pub struct ChatCompletionProvider;

impl SummaryProvider for ChatCompletionProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn path(&self) -> &'static str {
        "/chat/completions"
    }

    fn build_body(&self, config: &ProviderConfig, markdown: &str, stream: bool) -> Result<Value> {
        let request = ChatRequest {
            model: &config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: markdown,
                },
            ],
            max_completion_tokens: config.max_completion_tokens,
            temperature: config.temperature,
            stream,
        };

        Ok(serde_json::to_value(request)?)
    }

    fn stream_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(ChatStreamDecoder::default())
    }

    fn parse_whole(&self, body: &[u8]) -> Result<String> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {}", e)))?;
        Ok(fragment(&value)?.unwrap_or_default())
    }
}

/// Content carried by one response object.
///
/// Complete responses carry `message.content`, SSE deltas `delta.content`.
/// An object without a `choices` array is not a chat response.
fn fragment(value: &Value) -> Result<Option<String>> {
    if let Some(err) = provider_error(value) {
        return Err(err);
    }

    let choice = value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| Error::MalformedResponse("response has no choices".to_string()))?;

    let content = choice
        .get("message")
        .or_else(|| choice.get("delta"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string);

    Ok(content)
}

/// Decoder for chat responses.
///
/// Accepts bare JSON objects, possibly concatenated or split across reads,
/// and SSE `data:` lines.
#[derive(Default)]
struct ChatStreamDecoder {
    buffer: Vec<u8>,
}

impl ChatStreamDecoder {
    fn drain_whitespace(&mut self) {
        let skip = self
            .buffer
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.buffer.drain(..skip);
    }

    fn is_event_stream(&self) -> bool {
        self.buffer.starts_with(b"data:")
            || self.buffer.starts_with(b"event:")
            || self.buffer.starts_with(b"id:")
            || self.buffer.starts_with(b":")
    }

    /// Consume one complete SSE line; `None` when the line is not complete yet
    fn next_event_line(&mut self, fragments: &mut Vec<String>) -> Result<Option<()>> {
        let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        let line = line.trim();

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() && data != "[DONE]" {
                let value: Value = serde_json::from_str(data)
                    .map_err(|e| Error::MalformedResponse(format!("invalid event data: {}", e)))?;
                if let Some(text) = fragment(&value)? {
                    fragments.push(text);
                }
            }
        }

        Ok(Some(()))
    }

    /// Consume one complete JSON value; `None` when more bytes are needed
    fn next_object(&mut self, fragments: &mut Vec<String>) -> Result<Option<()>> {
        let mut values = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<Value>();
        let value = match values.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) if e.is_eof() => return Ok(None),
            Some(Err(e)) => {
                return Err(Error::MalformedResponse(format!("invalid JSON chunk: {}", e)))
            }
            None => return Ok(None),
        };
        let consumed = values.byte_offset();
        self.buffer.drain(..consumed);

        if let Some(text) = fragment(&value)? {
            fragments.push(text);
        }
        Ok(Some(()))
    }
}

impl StreamDecoder for ChatStreamDecoder {
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);
        let mut fragments = Vec::new();

        loop {
            self.drain_whitespace();
            if self.buffer.is_empty() {
                break;
            }

            let progressed = if self.is_event_stream() {
                self.next_event_line(&mut fragments)?
            } else {
                self.next_object(&mut fragments)?
            };

            if progressed.is_none() {
                break;
            }
        }

        Ok(fragments)
    }

    fn finish(&mut self) -> Result<Vec<String>> {
        // A final SSE line may lack its newline
        if self.is_event_stream() {
            self.buffer.push(b'\n');
            return self.push(&[]);
        }

        self.drain_whitespace();
        if self.buffer.is_empty() {
            Ok(Vec::new())
        } else {
            Err(Error::MalformedResponse(format!(
                "response ended inside a JSON object ({} bytes left)",
                self.buffer.len()
            )))
        }
    }
}
