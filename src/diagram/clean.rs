//! Normalize raw model output into a bare diagram script.

use crate::config::DEFAULT_DIAGRAM_TYPES;
use crate::util::strip_prefix_ignore_case;

const FENCE: &str = "```";

/// Lead-ins models like to put before the script (matched case-insensitively)
const CONVERSATIONAL_PREFIXES: &[&str] = &[
    "here is the mermaid diagram",
    "here's the mermaid diagram",
    "here is the mermaid script",
    "here's the mermaid script",
    "here is the workflow diagram",
    "here's the workflow diagram",
    "here is the diagram",
    "here's the diagram",
    "here is the script",
    "here's the script",
    "here is the workflow",
    "here's the workflow",
    "here is the flowchart",
    "here's the flowchart",
    "here is your diagram",
    "here's your diagram",
];

/// Strip a fence, then known prefixes, then whitespace. Never fails.
pub fn clean(raw: &str) -> String {
    clean_with_types(raw, DEFAULT_DIAGRAM_TYPES)
}

/// `clean`, recognizing `diagram_types` on the opening fence line
pub fn clean_with_types<S: AsRef<str>>(raw: &str, diagram_types: &[S]) -> String {
    let unfenced = unwrap_fence(raw.trim(), diagram_types);
    strip_prefixes(unfenced).trim().to_string()
}

/// Keep only the first fenced block, minus a language tag
pub(crate) fn unwrap_fence<'a, S: AsRef<str>>(text: &'a str, diagram_types: &[S]) -> &'a str {
    let Some(open) = text.find(FENCE) else {
        return text;
    };
    let after_open = open + FENCE.len();
    let Some(close_rel) = text[after_open..].find(FENCE) else {
        return text;
    };
    let inner = &text[after_open..after_open + close_rel];

    // A bare word on the fence line is a language tag, unless it is itself a
    // diagram keyword (` ```mindmap ` without a tag)
    let Some((first_line, rest)) = inner.split_once('\n') else {
        return inner;
    };
    let tag = first_line.trim().to_lowercase();
    let is_tag = !tag.contains(char::is_whitespace)
        && !diagram_types
            .iter()
            .any(|kind| tag.starts_with(kind.as_ref()));
    if is_tag { rest } else { inner }
}

fn strip_prefixes(text: &str) -> &str {
    let mut current = text.trim_start();
    for prefix in CONVERSATIONAL_PREFIXES {
        if let Some(rest) = strip_prefix_ignore_case(current, prefix) {
            current = rest.trim_start_matches([':', '.', ' ', '\t']).trim_start();
        }
    }
    current
}
