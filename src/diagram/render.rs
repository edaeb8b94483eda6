//! Turn an accepted script into a displayable structure, or a located error.
//!
//! Graph-like kinds (flowchart, sequence, state, class, ER) are parsed into
//! nodes and edges; every other kind is summarized by statement count.

use super::validate::DiagramScript;
use regex::Regex;
use std::sync::LazyLock;

/// `-->`, `---`, `==>`, `-.->`, `<-->`, `--o`, `--x`, with optional `|label|`,
/// or the inline `-- label -->` form
static FLOW_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:--\s+([^-|>]+?)\s+-->|<?(?:-{2,}|={2,}|-\.+-)[>ox]?\s*(?:\|([^|]*)\|)?)\s*")
        .unwrap()
});

static NODE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_][\w.\-]*)\s*(.*)$").unwrap());

static SEQ_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]*?)\s*(-->>|->>|-->|->|--x|-x|--\)|-\))\s*[+-]?\s*([^:]*?)\s*(?::\s*(.*))?$")
        .unwrap()
});

static CLASS_RELATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\w+)\s*(?:"[^"]*"\s*)?(<\|--|--\|>|\*--|--\*|o--|--o|<--|-->|<\|\.\.|\.\.\|>|\.\.>|<\.\.|--|\.\.)\s*(?:"[^"]*"\s*)?(\w*)\s*(?::\s*(.*))?$"#)
        .unwrap()
});

static ER_RELATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([\w-]+)\s+([|}o][|o](?:--|\.\.)[|o][|{o])\s+([\w-]*)\s*(?::\s*"?([^"]*)"?)?$"#)
        .unwrap()
});

const SEQUENCE_KEYWORDS: &[&str] = &[
    "autonumber",
    "loop",
    "alt",
    "else",
    "opt",
    "par",
    "and",
    "critical",
    "break",
    "rect",
    "end",
    "note",
    "activate",
    "deactivate",
    "title",
    "box",
];

const FLOWCHART_KEYWORDS: &[&str] = &[
    "subgraph",
    "end",
    "direction",
    "style",
    "classdef",
    "class",
    "click",
    "linkstyle",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Class,
    State,
    EntityRelationship,
    Other(String),
}

impl DiagramKind {
    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "flowchart" | "graph" => DiagramKind::Flowchart,
            "sequencediagram" => DiagramKind::Sequence,
            "classdiagram" => DiagramKind::Class,
            "statediagram" => DiagramKind::State,
            "erdiagram" => DiagramKind::EntityRelationship,
            other => DiagramKind::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
            DiagramKind::State => "state",
            DiagramKind::EntityRelationship => "entity-relationship",
            DiagramKind::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    pub kind: DiagramKind,
    pub direction: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Non-blank lines after the header
    pub statements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}{}", .line.map(|l| format!(" (line {})", l)).unwrap_or_default())]
pub struct RenderError {
    pub message: String,
    /// 1-based line in the script
    pub line: Option<usize>,
    pub snippet: Option<String>,
}

impl RenderError {
    fn at(line: usize, snippet: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            snippet: Some(snippet.trim().to_string()),
        }
    }
}

struct Builder {
    diagram: RenderedDiagram,
}

impl Builder {
    fn node(&mut self, id: &str, label: Option<&str>) {
        let label = label.map(str::trim).filter(|l| !l.is_empty());
        match self.diagram.nodes.iter_mut().find(|n| n.id == id) {
            Some(node) => {
                if let Some(label) = label {
                    node.label = label.to_string();
                }
            }
            None => self.diagram.nodes.push(Node {
                id: id.to_string(),
                label: label.unwrap_or(id).to_string(),
            }),
        }
    }

    fn edge(&mut self, from: &str, to: &str, label: Option<&str>) {
        self.node(from, None);
        self.node(to, None);
        self.diagram.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
            label: label
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        });
    }
}

pub fn render(script: &DiagramScript) -> Result<RenderedDiagram, RenderError> {
    let mut lines = script
        .as_str()
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with("%%"));

    let Some((_, header)) = lines.next() else {
        return Err(RenderError {
            message: "Diagram is empty".to_string(),
            line: None,
            snippet: None,
        });
    };
    let body: Vec<(usize, &str)> = lines.collect();
    if body.is_empty() {
        return Err(RenderError::at(1, header, "Diagram has no content after its header"));
    }

    let kind = DiagramKind::from_keyword(script.kind_keyword());
    let mut builder = Builder {
        diagram: RenderedDiagram {
            direction: match kind {
                DiagramKind::Flowchart => header.split_whitespace().nth(1).map(str::to_string),
                _ => None,
            },
            kind,
            nodes: Vec::new(),
            edges: Vec::new(),
            statements: body.len(),
        },
    };

    let mut block_depth = 0usize;
    for &(number, line) in &body {
        let text = line.trim();
        check_square_brackets(number, text)?;
        match builder.diagram.kind {
            DiagramKind::Flowchart => flowchart_line(&mut builder, number, text)?,
            DiagramKind::Sequence => sequence_line(&mut builder, number, text)?,
            DiagramKind::State => state_line(&mut builder, number, text)?,
            DiagramKind::Class => class_line(&mut builder, number, text, &mut block_depth)?,
            DiagramKind::EntityRelationship => er_line(&mut builder, number, text, &mut block_depth)?,
            DiagramKind::Other(_) => {}
        }
    }

    Ok(builder.diagram)
}

fn check_square_brackets(number: usize, text: &str) -> Result<(), RenderError> {
    let open = text.matches('[').count();
    let close = text.matches(']').count();
    if open != close {
        return Err(RenderError::at(number, text, "Unbalanced square brackets"));
    }
    Ok(())
}

fn first_word_is(text: &str, keywords: &[&str]) -> bool {
    text.split_whitespace()
        .next()
        .map(|w| keywords.contains(&w.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn flowchart_line(b: &mut Builder, number: usize, text: &str) -> Result<(), RenderError> {
    if first_word_is(text, FLOWCHART_KEYWORDS) {
        return Ok(());
    }
    for (open, close) in [('(', ')'), ('{', '}')] {
        if text.matches(open).count() != text.matches(close).count() {
            return Err(RenderError::at(number, text, format!("Unbalanced '{}{}'", open, close)));
        }
    }

    let mut segments = Vec::new();
    let mut labels = Vec::new();
    let mut last = 0;
    for caps in FLOW_ARROW.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        segments.push(&text[last..whole.start()]);
        labels.push(caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()));
        last = whole.end();
    }
    segments.push(&text[last..]);

    let mut groups = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        if segment.trim().is_empty() {
            let message = if i == 0 {
                "Edge is missing a source node"
            } else {
                "Edge is missing a target node"
            };
            return Err(RenderError::at(number, text, message));
        }
        let mut ids = Vec::new();
        for part in segment.split('&') {
            let (id, label) = parse_node_ref(part)
                .ok_or_else(|| RenderError::at(number, text, "Node is missing an id"))?;
            b.node(&id, label.as_deref());
            ids.push(id);
        }
        groups.push(ids);
    }

    for (i, label) in labels.iter().enumerate() {
        for from in &groups[i] {
            for to in &groups[i + 1] {
                b.edge(from, to, *label);
            }
        }
    }
    Ok(())
}

fn parse_node_ref(part: &str) -> Option<(String, Option<String>)> {
    let caps = NODE_REF.captures(part.trim())?;
    let id = caps.get(1)?.as_str().to_string();
    let shape = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    let label = if shape.is_empty() {
        None
    } else {
        Some(
            shape
                .trim_matches(|c| "[](){}<>/\\".contains(c))
                .trim_matches('"')
                .to_string(),
        )
    };
    Some((id, label))
}

fn sequence_line(b: &mut Builder, number: usize, text: &str) -> Result<(), RenderError> {
    let first = text.split_whitespace().next().unwrap_or("").to_lowercase();
    if first == "participant" || first == "actor" {
        let rest = text[first.len()..].trim();
        let (id, alias) = match rest.split_once(" as ") {
            Some((id, alias)) => (id.trim(), Some(alias)),
            None => (rest, None),
        };
        if id.is_empty() {
            return Err(RenderError::at(number, text, "Participant has no name"));
        }
        b.node(id, alias);
        return Ok(());
    }
    if SEQUENCE_KEYWORDS.contains(&first.as_str()) {
        return Ok(());
    }

    let Some(caps) = SEQ_MESSAGE.captures(text) else {
        return Ok(());
    };
    let from = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    let to = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
    if from.is_empty() {
        return Err(RenderError::at(number, text, "Message is missing a sender"));
    }
    if to.is_empty() {
        return Err(RenderError::at(number, text, "Message is missing a receiver"));
    }
    b.edge(from, to, caps.get(4).map(|m| m.as_str()));
    Ok(())
}

fn state_line(b: &mut Builder, number: usize, text: &str) -> Result<(), RenderError> {
    let Some((from, rest)) = text.split_once("-->") else {
        if let Some((id, description)) = text.split_once(':') {
            if !id.contains(char::is_whitespace) {
                b.node(id.trim(), Some(description));
            }
        }
        return Ok(());
    };
    let (to, label) = match rest.split_once(':') {
        Some((to, label)) => (to, Some(label)),
        None => (rest, None),
    };
    let (from, to) = (from.trim(), to.trim());
    if from.is_empty() || to.is_empty() {
        return Err(RenderError::at(number, text, "Transition needs a state on both sides"));
    }
    b.edge(from, to, label);
    Ok(())
}

fn class_line(
    b: &mut Builder,
    number: usize,
    text: &str,
    depth: &mut usize,
) -> Result<(), RenderError> {
    if *depth > 0 {
        if text.starts_with('}') {
            *depth -= 1;
        }
        return Ok(());
    }
    if let Some(rest) = text.strip_prefix("class ") {
        let name = rest.trim_end_matches('{').trim();
        let name = name.split(['~', '<', ' ']).next().unwrap_or("");
        if name.is_empty() {
            return Err(RenderError::at(number, text, "Class has no name"));
        }
        b.node(name, None);
        if text.ends_with('{') {
            *depth += 1;
        }
        return Ok(());
    }
    if let Some(caps) = CLASS_RELATION.captures(text) {
        let from = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let to = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        if to.is_empty() {
            return Err(RenderError::at(number, text, "Relationship is missing a target class"));
        }
        b.edge(from, to, caps.get(4).map(|m| m.as_str()));
    }
    Ok(())
}

fn er_line(
    b: &mut Builder,
    number: usize,
    text: &str,
    depth: &mut usize,
) -> Result<(), RenderError> {
    if *depth > 0 {
        if text.starts_with('}') {
            *depth -= 1;
        }
        return Ok(());
    }
    if let Some(entity) = text.strip_suffix('{') {
        b.node(entity.trim(), None);
        *depth += 1;
        return Ok(());
    }
    if let Some(caps) = ER_RELATION.captures(text) {
        let from = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let to = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        if to.is_empty() {
            return Err(RenderError::at(number, text, "Relationship is missing a target entity"));
        }
        b.edge(from, to, caps.get(4).map(|m| m.as_str()));
    }
    Ok(())
}

impl RenderedDiagram {
    fn label_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.label.as_str())
            .unwrap_or(id)
    }

    /// Plain-text preview for terminals without image support
    pub fn to_lines(&self) -> Vec<String> {
        let mut title = format!("┌─ {}", self.kind.label());
        if let Some(direction) = &self.direction {
            title.push_str(&format!(" ({})", direction));
        }
        let mut lines = vec![title];

        if self.nodes.is_empty() {
            lines.push(format!("│ {} statements", self.statements));
        } else {
            lines.push(format!(
                "│ {} nodes, {} edges",
                self.nodes.len(),
                self.edges.len()
            ));
            for edge in &self.edges {
                let arrow = match &edge.label {
                    Some(label) => format!(" --{}--> ", label),
                    None => " --> ".to_string(),
                };
                lines.push(format!(
                    "│   {}{}{}",
                    self.label_of(&edge.from),
                    arrow,
                    self.label_of(&edge.to)
                ));
            }
            let connected: Vec<&Node> = self
                .nodes
                .iter()
                .filter(|n| !self.edges.iter().any(|e| e.from == n.id || e.to == n.id))
                .collect();
            for node in connected {
                lines.push(format!("│   [{}]", node.label));
            }
        }
        lines.push("└─".to_string());
        lines
    }
}

impl RenderError {
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec!["┌─ diagram error".to_string(), format!("│ {}", self)];
        if let Some(snippet) = &self.snippet {
            lines.push(format!("│   {}", snippet));
        }
        lines.push("└─".to_string());
        lines
    }
}
