//! Cheap syntactic plausibility checks run before a script reaches the renderer.
//!
//! This is not a parser. It rejects the failure shapes models actually
//! produce: prose, truncated output, unbalanced labels, placeholder nodes.

use crate::config::DiagramConfig;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// `A[label]`, `A(label)`, `A{label}` on a single line
static NODE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]\n]+\]|\([^()\n]+\)|\{[^{}\n]+\}").unwrap());

static ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<?-{1,2}>>?|<?={2,}>|-\.+->|-{3}|\.\.>|<\|--|--\|>|\|[|o]--|--[|o]\{|\}[|o]--")
        .unwrap()
});

static PARTICIPANT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*(participant|actor|class)\s+\S").unwrap());

/// Known-bad shapes, each with a short reason for diagnostics
static BAD_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"\[\s*(\.{3}|…)\s*\]|(-->|---)\s*(\.{3}|…)|(\.{3}|…)\s*(-->|---)").unwrap(),
            "placeholder `...` node",
        ),
        (
            Regex::new(r"\]\s*(%%|//)").unwrap(),
            "comment directly after a node label",
        ),
        (
            Regex::new(r"(?m)^\s*(-->|---|==>|-\.->|->>|->)\s*$").unwrap(),
            "arrow with no nodes",
        ),
    ]
});

/// First rule a candidate script broke
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    TooShort { len: usize, min: usize },
    TooLong { len: usize, max: usize },
    UnknownDiagramType,
    NoStructure,
    UnbalancedBrackets { open: usize, close: usize },
    BadPattern(&'static str),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::TooShort { len, min } => {
                write!(f, "too short ({} chars, minimum {})", len, min)
            }
            ValidationIssue::TooLong { len, max } => {
                write!(f, "too long ({} chars, maximum {})", len, max)
            }
            ValidationIssue::UnknownDiagramType => {
                write!(f, "does not start with a known diagram type")
            }
            ValidationIssue::NoStructure => {
                write!(f, "no node labels, arrows or participants")
            }
            ValidationIssue::UnbalancedBrackets { open, close } => {
                write!(f, "unbalanced brackets ({} '[' vs {} ']')", open, close)
            }
            ValidationIssue::BadPattern(reason) => write!(f, "{}", reason),
        }
    }
}

/// A script that passed validation. Only `ScriptValidator::accept` builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramScript {
    text: String,
    kind: String,
}

impl DiagramScript {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The recognized type keyword the script starts with (lowercase)
    pub fn kind_keyword(&self) -> &str {
        &self.kind
    }
}

impl fmt::Display for DiagramScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone)]
pub struct ScriptValidator {
    min_length: usize,
    max_length: usize,
    diagram_types: Vec<String>,
}

impl Default for ScriptValidator {
    fn default() -> Self {
        Self::from_config(&DiagramConfig::default())
    }
}

impl ScriptValidator {
    pub fn from_config(config: &DiagramConfig) -> Self {
        Self {
            min_length: config.min_script_length,
            max_length: config.max_script_length,
            diagram_types: config
                .valid_diagram_types
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    /// Recognized type keywords (lowercase)
    pub fn diagram_types(&self) -> &[String] {
        &self.diagram_types
    }

    pub fn is_valid(&self, script: &str) -> bool {
        self.check(script).is_ok()
    }

    pub fn accept(&self, script: &str) -> Result<DiagramScript, ValidationIssue> {
        let kind = self.check(script)?;
        Ok(DiagramScript {
            text: script.trim().to_string(),
            kind,
        })
    }

    /// Run every rule in order; returns the matched type keyword on success
    pub fn check(&self, script: &str) -> Result<String, ValidationIssue> {
        let text = script.trim();

        let len = text.chars().count();
        if len < self.min_length {
            return Err(ValidationIssue::TooShort {
                len,
                min: self.min_length,
            });
        }
        if len > self.max_length {
            return Err(ValidationIssue::TooLong {
                len,
                max: self.max_length,
            });
        }

        let lower = text.to_lowercase();
        let kind = self
            .diagram_types
            .iter()
            .find(|kind| lower.starts_with(kind.as_str()))
            .ok_or(ValidationIssue::UnknownDiagramType)?;

        let has_structure = NODE_LABEL.is_match(text)
            || ARROW.is_match(text)
            || PARTICIPANT_MARKER.is_match(text);
        if !has_structure {
            return Err(ValidationIssue::NoStructure);
        }

        let open = text.matches('[').count();
        let close = text.matches(']').count();
        if open != close {
            return Err(ValidationIssue::UnbalancedBrackets { open, close });
        }

        if let Some((_, reason)) = BAD_PATTERNS.iter().find(|(re, _)| re.is_match(text)) {
            return Err(ValidationIssue::BadPattern(*reason));
        }

        Ok(kind.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::clean::clean;

    const LOGIN_FLOW: &str = "flowchart TD\n    A[User opens login] --> B[Enter credentials]\n    B --> C{Valid?}\n    C -->|yes| D[Dashboard]\n    C -->|no| B";

    fn validator() -> ScriptValidator {
        ScriptValidator::default()
    }

    #[test]
    fn test_accepts_common_diagrams() {
        let v = validator();
        assert!(v.is_valid(LOGIN_FLOW));
        assert!(v.is_valid("sequenceDiagram\n    participant U as User\n    U->>S: login"));
        assert!(v.is_valid("classDiagram\n    class Account\n    Account <|-- Admin"));
        assert!(v.is_valid("erDiagram\n    CUSTOMER ||--o{ ORDER : places"));
        assert!(v.is_valid("stateDiagram-v2\n    [*] --> Idle\n    Idle --> Busy"));
    }

    #[test]
    fn test_length_bounds() {
        let v = validator();
        assert_eq!(
            v.check("graph TD\nA-->B"),
            Err(ValidationIssue::TooShort { len: 14, min: 20 })
        );

        let mut long = String::from("flowchart TD\n");
        while long.len() <= 5000 {
            long.push_str("    A[Step] --> B[Next]\n");
        }
        assert!(matches!(v.check(&long), Err(ValidationIssue::TooLong { .. })));
    }

    #[test]
    fn test_custom_bounds_from_config() {
        let config = DiagramConfig {
            min_script_length: 5,
            max_script_length: 30,
            ..DiagramConfig::default()
        };
        let v = ScriptValidator::from_config(&config);
        assert!(v.is_valid("graph TD\nA-->B"));
        assert!(!v.is_valid(LOGIN_FLOW));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert_eq!(
            validator().check("Sure! The login flow: A[Start] --> B[End]"),
            Err(ValidationIssue::UnknownDiagramType)
        );
    }

    #[test]
    fn test_no_structure_rejected() {
        assert_eq!(
            validator().check("flowchart TD\n    just some words here"),
            Err(ValidationIssue::NoStructure)
        );
    }

    #[test]
    fn test_unbalanced_brackets_rejected() {
        assert_eq!(
            validator().check("flowchart TD\n    A[Start --> B[End]"),
            Err(ValidationIssue::UnbalancedBrackets { open: 2, close: 1 })
        );
        assert!(!validator().is_valid("flowchart TD\n    A[Start]] --> B[End]"));
    }

    #[test]
    fn test_bad_patterns_rejected() {
        let v = validator();
        assert!(matches!(
            v.check("flowchart TD\n    A[Start] --> ...\n"),
            Err(ValidationIssue::BadPattern(_))
        ));
        assert!(matches!(
            v.check("flowchart TD\n    A[Start] %% first step\n    A --> B[End]"),
            Err(ValidationIssue::BadPattern(_))
        ));
        assert!(matches!(
            v.check("flowchart TD\n    A[Start] --> B[End]\n    -->\n"),
            Err(ValidationIssue::BadPattern(_))
        ));
    }

    #[test]
    fn test_fence_unwrap_does_not_change_validity() {
        let v = validator();
        let scripts = [
            LOGIN_FLOW,
            "flowchart TD\n    A[Start --> B[End]",
            "flowchart TD\n    nothing structural",
        ];
        for script in scripts {
            let direct = v.is_valid(script);
            for wrapped in [
                format!("```mermaid\n{}\n```", script),
                format!("```\n{}\n```", script),
            ] {
                assert_eq!(v.is_valid(&clean(&wrapped)), direct, "{}", wrapped);
            }
        }
    }

    #[test]
    fn test_accept_records_kind_and_trims() {
        let script = validator().accept(&format!("  {}\n", LOGIN_FLOW)).unwrap();
        assert_eq!(script.kind_keyword(), "flowchart");
        assert_eq!(script.as_str(), LOGIN_FLOW);
    }
}
