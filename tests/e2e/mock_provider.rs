//! Mock provider for e2e tests
//!
//! Replays scripted replies in order, one per complete() call, and records
//! the prompt each call received.

use anyhow::Result;
use async_stream::stream;
use flowkey::message::{Message, StreamEvent};
use flowkey::provider::{EventStream, Provider, ProviderError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub enum Reply {
    /// Streamed as-is
    Events(Vec<StreamEvent>),
    /// Streamed after a delay
    Delayed(Duration, Vec<StreamEvent>),
    /// The request itself fails
    Fail(ProviderError),
    /// Never produces anything
    Hang,
}

pub struct MockProvider {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Queue a complete text reply split into a few deltas
    pub fn queue_text(&self, text: &str) {
        let mut events: Vec<StreamEvent> = text
            .split_inclusive('\n')
            .map(|chunk| StreamEvent::TextDelta(chunk.to_string()))
            .collect();
        events.push(StreamEvent::MessageEnd {
            stop_reason: Some("stop".to_string()),
        });
        self.queue(Reply::Events(events));
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    async fn complete(&self, messages: &[Message], _system: &str) -> Result<EventStream> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);

        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Hang);
        let (delay, events, hang) = match reply {
            Reply::Events(events) => (None, events, false),
            Reply::Delayed(delay, events) => (Some(delay), events, false),
            Reply::Fail(err) => return Err(anyhow::Error::new(err)),
            Reply::Hang => (None, Vec::new(), true),
        };

        let stream = stream! {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if hang {
                std::future::pending::<()>().await;
            }
            for event in events {
                yield Ok::<StreamEvent, anyhow::Error>(event);
            }
        };

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> String {
        "mock".to_string()
    }
}
