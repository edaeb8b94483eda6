//! One model request per attempt, raced against a timeout.

use super::error::AttemptError;
use super::prompt::SYSTEM_PROMPT;
use crate::message::{Message, StreamEvent};
use crate::provider::{self, ErrorClass, Provider};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Runs a single generation attempt. No retries here; the orchestrator owns that.
#[async_trait]
pub trait AttemptExecutor: Send + Sync {
    async fn execute(&self, prompt: &str, timeout: Duration) -> Result<String, AttemptError>;
}

#[async_trait]
impl<T: AttemptExecutor + ?Sized> AttemptExecutor for Arc<T> {
    async fn execute(&self, prompt: &str, timeout: Duration) -> Result<String, AttemptError> {
        (**self).execute(prompt, timeout).await
    }
}

/// Streams a completion from a `Provider` and accumulates the text deltas.
pub struct ProviderExecutor {
    provider: Arc<dyn Provider>,
}

impl ProviderExecutor {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    async fn accumulate(&self, prompt: &str) -> Result<String, AttemptError> {
        let messages = [Message::user(prompt)];
        let mut stream = self
            .provider
            .complete(&messages, SYSTEM_PROMPT)
            .await
            .map_err(|e| AttemptError::upstream(provider::classify(&e), format!("{:#}", e)))?;

        let mut text = String::new();
        while let Some(event) = stream.next().await {
            let event = event
                .map_err(|e| AttemptError::upstream(provider::classify(&e), format!("{:#}", e)))?;
            match event {
                StreamEvent::TextDelta(delta) => text.push_str(&delta),
                StreamEvent::MessageEnd { .. } => break,
                StreamEvent::Error {
                    message,
                    retry_after_secs,
                } => {
                    let class = if retry_after_secs.is_some() {
                        ErrorClass::RateLimit
                    } else {
                        provider::classify_message(&message)
                    };
                    return Err(AttemptError::upstream(class, message));
                }
            }
        }
        Ok(text)
    }
}

#[async_trait]
impl AttemptExecutor for ProviderExecutor {
    async fn execute(&self, prompt: &str, timeout: Duration) -> Result<String, AttemptError> {
        // On timeout the accumulation future is dropped, which aborts the
        // request; its partial text lives only inside that future.
        let text = match tokio::time::timeout(timeout, self.accumulate(prompt)).await {
            Ok(result) => result?,
            Err(_) => return Err(AttemptError::Timeout(timeout)),
        };

        if text.trim().is_empty() {
            return Err(AttemptError::EmptyResponse);
        }
        Ok(text)
    }
}
