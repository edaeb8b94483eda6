pub mod openai;

use crate::message::{Message, StreamEvent};
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of events from a provider
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Provider trait for LLM backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send messages and get a streaming response
    async fn complete(&self, messages: &[Message], system: &str) -> Result<EventStream>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model identifier being used
    fn model(&self) -> String {
        "unknown".to_string()
    }
}

/// Backend failures a caller may need to tell apart.
///
/// Providers attach these to the `anyhow::Error` they return; `classify`
/// recovers them with `downcast_ref` and falls back to message heuristics.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ProviderError {
    /// Map a non-success HTTP status to the matching error
    pub fn from_status(status: u16, body: &str, retry_after_secs: Option<u64>) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            body.trim().to_string()
        };
        match status {
            401 | 403 => ProviderError::Authentication(message),
            429 => ProviderError::RateLimited {
                message,
                retry_after_secs,
            },
            _ => ProviderError::Api { status, message },
        }
    }
}

/// Coarse failure class used by diagram generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Authentication,
    RateLimit,
    Network,
    Other,
}

pub fn classify(err: &anyhow::Error) -> ErrorClass {
    if let Some(provider_err) = err.downcast_ref::<ProviderError>() {
        return match provider_err {
            ProviderError::Authentication(_) => ErrorClass::Authentication,
            ProviderError::RateLimited { .. } => ErrorClass::RateLimit,
            ProviderError::Network(_) => ErrorClass::Network,
            ProviderError::Api { status, .. } => match status {
                401 | 403 => ErrorClass::Authentication,
                429 => ErrorClass::RateLimit,
                _ => ErrorClass::Other,
            },
        };
    }
    if let Some(req_err) = err.downcast_ref::<reqwest::Error>() {
        if req_err.is_connect() || req_err.is_timeout() || req_err.is_request() {
            return ErrorClass::Network;
        }
    }
    classify_message(&format!("{:#}", err))
}

/// Best-effort classification of a free-form backend message
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if lower.contains("401")
        || lower.contains("unauthorized")
        || lower.contains("invalid api key")
        || lower.contains("invalid_api_key")
        || lower.contains("incorrect api key")
        || lower.contains("authentication")
    {
        ErrorClass::Authentication
    } else if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("quota")
    {
        ErrorClass::RateLimit
    } else if lower.contains("connection reset")
        || lower.contains("connection closed")
        || lower.contains("connection refused")
        || lower.contains("broken pipe")
        || lower.contains("dns error")
        || lower.contains("error sending request")
        || lower.contains("error reading")
        || lower.contains("unexpected eof")
        || lower.contains("network")
    {
        ErrorClass::Network
    } else {
        ErrorClass::Other
    }
}
