use crate::provider::ErrorClass;
use std::fmt;
use std::time::Duration;

/// Why a single generation attempt produced no text.
///
/// These stay inside the retry loop; only the last one is mapped to a
/// `DiagramError` once the attempt budget runs out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error("attempt timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("upstream error: {message}")]
    Upstream { class: ErrorClass, message: String },
}

impl AttemptError {
    pub fn upstream(class: ErrorClass, message: impl Into<String>) -> Self {
        AttemptError::Upstream {
            class,
            message: message.into(),
        }
    }

    /// Credential failures end the whole run; retrying cannot fix them
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AttemptError::Upstream {
                class: ErrorClass::Authentication,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagramErrorKind {
    NoContent,
    Authentication,
    RateLimit,
    Network,
    Timeout,
    EmptyResponse,
    ValidationFailed,
    GenerationFailed,
}

impl DiagramErrorKind {
    pub const ALL: [DiagramErrorKind; 8] = [
        DiagramErrorKind::NoContent,
        DiagramErrorKind::Authentication,
        DiagramErrorKind::RateLimit,
        DiagramErrorKind::Network,
        DiagramErrorKind::Timeout,
        DiagramErrorKind::EmptyResponse,
        DiagramErrorKind::ValidationFailed,
        DiagramErrorKind::GenerationFailed,
    ];

    /// The one user-facing message for this kind
    pub fn message(&self) -> &'static str {
        match self {
            DiagramErrorKind::NoContent => {
                "There is no conversation to build a diagram from yet. Send a message first."
            }
            DiagramErrorKind::Authentication => {
                "The language model rejected the API credentials. Check your API key and try again."
            }
            DiagramErrorKind::RateLimit => {
                "The language model is busy right now (rate limited). Please wait a moment and try again."
            }
            DiagramErrorKind::Network => {
                "Could not reach the language model. Check your connection and try again."
            }
            DiagramErrorKind::Timeout => "Diagram generation timed out. Please try again.",
            DiagramErrorKind::EmptyResponse => {
                "The language model returned an empty response. Please try again."
            }
            DiagramErrorKind::ValidationFailed => {
                "Could not produce a valid diagram from this conversation. Try rephrasing or adding more detail."
            }
            DiagramErrorKind::GenerationFailed => "Diagram generation failed. Please try again.",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            DiagramErrorKind::NoContent => "no_content",
            DiagramErrorKind::Authentication => "authentication",
            DiagramErrorKind::RateLimit => "rate_limit",
            DiagramErrorKind::Network => "network",
            DiagramErrorKind::Timeout => "timeout",
            DiagramErrorKind::EmptyResponse => "empty_response",
            DiagramErrorKind::ValidationFailed => "validation_failed",
            DiagramErrorKind::GenerationFailed => "generation_failed",
        }
    }
}

/// Terminal failure of a diagram request: a kind plus its fixed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagramError {
    pub kind: DiagramErrorKind,
    pub message: &'static str,
}

impl DiagramError {
    pub fn new(kind: DiagramErrorKind) -> Self {
        Self {
            kind,
            message: kind.message(),
        }
    }
}

impl From<DiagramErrorKind> for DiagramError {
    fn from(kind: DiagramErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<&AttemptError> for DiagramError {
    fn from(err: &AttemptError) -> Self {
        let kind = match err {
            AttemptError::Timeout(_) => DiagramErrorKind::Timeout,
            AttemptError::EmptyResponse => DiagramErrorKind::EmptyResponse,
            AttemptError::Upstream { class, .. } => match class {
                ErrorClass::Authentication => DiagramErrorKind::Authentication,
                ErrorClass::RateLimit => DiagramErrorKind::RateLimit,
                ErrorClass::Network => DiagramErrorKind::Network,
                ErrorClass::Other => DiagramErrorKind::GenerationFailed,
            },
        };
        DiagramError::new(kind)
    }
}

impl fmt::Display for DiagramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl std::error::Error for DiagramError {}
