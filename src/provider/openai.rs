//! OpenAI-compatible chat completions provider (streaming SSE).

use super::{EventStream, Provider, ProviderError};
use crate::config::ProviderConfig;
use crate::message::{Message, Role, StreamEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn convert_messages<'a>(messages: &'a [Message], system: &'a str) -> Vec<ApiMessage<'a>> {
    let mut result = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        result.push(ApiMessage {
            role: "system",
            content: system,
        });
    }

    for msg in messages {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            // Stored diagrams are not replayed to the model
            Role::Diagram => continue,
        };
        result.push(ApiMessage {
            role,
            content: &msg.content,
        });
    }

    result
}

#[derive(Deserialize, Debug)]
struct SseChunk {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

/// Stream wrapper for OpenAI SSE events
struct OpenAIStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    /// Raw bytes; a chunk may end inside a multibyte character
    buffer: Vec<u8>,
    done: bool,
}

impl Stream for OpenAIStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.parse_next_event() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(anyhow::Error::new(ProviderError::Network(
                        e.to_string(),
                    )))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    // Flush a trailing line without newline
                    if !self.buffer.is_empty() {
                        self.buffer.push(b'\n');
                        continue;
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => {
                    return Poll::Pending;
                }
            }
        }
    }
}

impl OpenAIStream {
    fn new(stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
            buffer: Vec::new(),
            done: false,
        }
    }

    fn parse_next_event(&mut self) -> Option<StreamEvent> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            // Decode whole lines only, so split characters are rejoined first
            let line = String::from_utf8_lossy(&raw[..pos]);
            let line = line.trim_end_matches('\r');

            if let Some(event) = parse_sse_line(line) {
                return Some(event);
            }
        }
        None
    }
}

fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(StreamEvent::MessageEnd { stop_reason: None });
    }

    let chunk = serde_json::from_str::<SseChunk>(data).ok()?;
    if let Some(error) = chunk.error {
        return Some(StreamEvent::Error {
            message: error.message,
            retry_after_secs: None,
        });
    }

    let choice = chunk.choices.into_iter().next()?;
    if let Some(content) = choice.delta.content {
        if !content.is_empty() {
            return Some(StreamEvent::TextDelta(content));
        }
    }
    choice
        .finish_reason
        .map(|reason| StreamEvent::MessageEnd {
            stop_reason: Some(reason),
        })
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn complete(&self, messages: &[Message], system: &str) -> Result<EventStream> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            anyhow::Error::new(ProviderError::Authentication(
                "No API key configured. Set FLOWKEY_API_KEY or add api_key to config.toml."
                    .to_string(),
            ))
        })?;

        let request = ApiRequest {
            model: &self.model,
            messages: convert_messages(messages, system),
            temperature: self.temperature,
            stream: true,
        };

        crate::logging::debug(&format!(
            "POST {} model={} messages={}",
            self.endpoint(),
            self.model,
            request.messages.len()
        ));

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::Error::new(ProviderError::Network(e.to_string())))
            .context("Failed to send request to chat completions API")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::Error::new(ProviderError::from_status(
                status,
                &body,
                retry_after,
            )));
        }

        let stream = OpenAIStream::new(response.bytes_stream());
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
