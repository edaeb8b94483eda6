//! Prompt templates for diagram generation, strictest first.

use super::NO_DIAGRAM;

/// System instruction sent with every attempt
pub const SYSTEM_PROMPT: &str = "You convert conversations into Mermaid diagram scripts. \
Reply with the diagram script only: no explanations, no markdown fences, no commentary.";

const CONVERSATION_MARKER: &str = "{conversation}";
const SENTINEL_MARKER: &str = "{no_diagram}";

const PRIMARY_TEMPLATE: &str = r#"Read the conversation below and produce a Mermaid diagram of the workflow, process or structure it describes.

Rules:
1. Start with a diagram type keyword such as `flowchart TD`, `sequenceDiagram`, `classDiagram` or `stateDiagram-v2`.
2. Give every node a short id and a label in square brackets, for example `A[User logs in]`.
3. Connect nodes with `-->` arrows. Put edge labels between pipes: `A -->|yes| B`.
4. Every `[` must have a matching `]`. Do not nest brackets.
5. Never use `...` as a node or leave an arrow without nodes on both sides.
6. Do not add comments (`%%`) after nodes or edges.
7. Output only the diagram script, with no markdown fences and no explanation.

If the conversation does not describe anything that can meaningfully be drawn as a diagram, reply with exactly {no_diagram} and nothing else.

Conversation:
{conversation}"#;

const SECONDARY_TEMPLATE: &str = r#"Create a simple Mermaid flowchart for the conversation below.

- First line must be `flowchart TD`.
- One step per line, written as `A[Step] --> B[Next step]`.
- Labels go in square brackets. Use only `-->` arrows.
- Output only the flowchart, nothing else. If nothing can be drawn, reply {no_diagram}.

Conversation:
{conversation}"#;

const FALLBACK_TEMPLATE: &str = r#"Fill in this template with the main steps from the conversation. Keep it this simple. Reply with the filled template only.

flowchart TD
    A[First step] --> B[Second step]
    B --> C[Third step]

Conversation:
{conversation}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTier {
    Primary,
    Secondary,
    Fallback,
}

impl PromptTier {
    pub fn for_attempt(attempt: u32) -> Self {
        match attempt {
            0 | 1 => PromptTier::Primary,
            2 => PromptTier::Secondary,
            _ => PromptTier::Fallback,
        }
    }

    fn template(&self) -> &'static str {
        match self {
            PromptTier::Primary => PRIMARY_TEMPLATE,
            PromptTier::Secondary => SECONDARY_TEMPLATE,
            PromptTier::Fallback => FALLBACK_TEMPLATE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PromptTier::Primary => "primary",
            PromptTier::Secondary => "secondary",
            PromptTier::Fallback => "fallback",
        }
    }
}

/// Prompt for a 1-based attempt index. Attempts past the third reuse the fallback.
pub fn select_prompt(attempt: u32, conversation: &str) -> String {
    PromptTier::for_attempt(attempt)
        .template()
        .replace(SENTINEL_MARKER, NO_DIAGRAM)
        .replace(CONVERSATION_MARKER, conversation)
}
