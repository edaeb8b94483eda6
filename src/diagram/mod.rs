//! Conversation-to-diagram pipeline.
//!
//! `orchestrator` drives prompt selection, a timed model call, cleaning and
//! validation until it reaches an accepted script, the `NO_DIAGRAM` sentinel,
//! or one `DiagramError`. `render` turns an accepted script into a preview.

pub mod clean;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod prompt;
pub mod render;
pub mod validate;

pub use clean::clean;
pub use error::{AttemptError, DiagramError, DiagramErrorKind};
pub use executor::{AttemptExecutor, ProviderExecutor};
pub use orchestrator::{
    DiagramGenerator, GenerationAttempt, GenerationReport, GenerationSettings, GenerationState,
};
pub use prompt::{PromptTier, select_prompt};
pub use render::{RenderError, RenderedDiagram, render};
pub use validate::{DiagramScript, ScriptValidator, ValidationIssue};

/// Reply the model gives when the conversation has no workflow to draw
pub const NO_DIAGRAM: &str = "NO_DIAGRAM";

/// Result of a successful run: a script to render, or nothing to show
#[derive(Debug, Clone, PartialEq)]
pub enum DiagramOutcome {
    Diagram(DiagramScript),
    NoDiagram,
}

/// Whether a raw reply is the sentinel.
///
/// Tolerates a code fence (with or without a language tag), surrounding
/// whitespace, one layer of backticks or quotes and a trailing period.
/// Anything else around the token, such as a sentence, does not count.
pub fn is_no_diagram(raw: &str) -> bool {
    let mut text = clean::unwrap_fence(raw.trim(), crate::config::DEFAULT_DIAGRAM_TYPES).trim();
    for quote in ['`', '"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
        {
            text = inner.trim();
            break;
        }
    }
    let text = text.strip_suffix('.').unwrap_or(text).trim();
    text == NO_DIAGRAM
}
