//! Configuration file support for flowkey
//!
//! Config is loaded from `~/.flowkey/config.toml` (or `$FLOWKEY_HOME/config.toml`)
//! Environment variables override config file settings.

use crate::storage::flowkey_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global config instance (loaded once on first access)
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::load)
}

/// Diagram keyword prefixes accepted at the start of a script (compared lowercase)
pub const DEFAULT_DIAGRAM_TYPES: &[&str] = &[
    "flowchart",
    "graph",
    "sequencediagram",
    "classdiagram",
    "statediagram",
    "erdiagram",
    "journey",
    "gantt",
    "pie",
    "quadrantchart",
    "requirementdiagram",
    "gitgraph",
    "mindmap",
    "timeline",
    "zenuml",
    "sankey",
];

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Language model backend
    pub provider: ProviderConfig,

    /// Diagram generation pipeline
    pub diagram: DiagramConfig,
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible API base URL (default: https://api.openai.com/v1)
    pub base_url: String,
    /// Model identifier (default: gpt-4o-mini)
    pub model: String,
    /// API key (prefer FLOWKEY_API_KEY or OPENAI_API_KEY env var)
    pub api_key: Option<String>,
    /// Sampling temperature for diagram generation (default: 0.2)
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.2,
        }
    }
}

/// Diagram pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// Maximum generation attempts per request (default: 3)
    pub max_retry_attempts: u32,
    /// Per-attempt timeout in milliseconds (default: 30000)
    pub generation_timeout_ms: u64,
    /// Recognized diagram keyword prefixes
    pub valid_diagram_types: Vec<String>,
    /// Minimum trimmed script length (default: 20)
    pub min_script_length: usize,
    /// Maximum trimmed script length (default: 5000)
    pub max_script_length: usize,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            generation_timeout_ms: 30_000,
            valid_diagram_types: DEFAULT_DIAGRAM_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_script_length: 20,
            max_script_length: 5000,
        }
    }
}

impl DiagramConfig {
    /// Attempt budget, never below one
    pub fn max_attempts(&self) -> u32 {
        self.max_retry_attempts.max(1)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Reset settings that would reject every script back to their defaults
    fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.min_script_length > self.max_script_length {
            crate::logging::warn(&format!(
                "min_script_length {} exceeds max_script_length {}; using {}..={}",
                self.min_script_length,
                self.max_script_length,
                defaults.min_script_length,
                defaults.max_script_length
            ));
            self.min_script_length = defaults.min_script_length;
            self.max_script_length = defaults.max_script_length;
        }
        if self.valid_diagram_types.is_empty() {
            crate::logging::warn("valid_diagram_types is empty; using the built-in list");
            self.valid_diagram_types = defaults.valid_diagram_types;
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> Option<PathBuf> {
        flowkey_dir().ok().map(|d| d.join("config.toml"))
    }

    /// Load config from file, with environment variable overrides
    pub fn load() -> Self {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        config.diagram.sanitize();
        config
    }

    /// Load config from file only (no env overrides)
    fn load_from_file() -> Option<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return None;
        }

        let content = std::fs::read_to_string(&path).ok()?;
        match Self::parse(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                crate::logging::error(&format!("Failed to parse config file: {}", e));
                None
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        for kind in &mut config.diagram.valid_diagram_types {
            *kind = kind.trim().to_lowercase();
        }
        config.diagram.valid_diagram_types.retain(|k| !k.is_empty());
        config.diagram.sanitize();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FLOWKEY_BASE_URL") {
            self.provider.base_url = v;
        }
        if let Ok(v) = std::env::var("FLOWKEY_MODEL") {
            self.provider.model = v;
        }
        if let Ok(v) = std::env::var("FLOWKEY_API_KEY") {
            self.provider.api_key = Some(v);
        } else if self.provider.api_key.is_none() {
            if let Ok(v) = std::env::var("OPENAI_API_KEY") {
                self.provider.api_key = Some(v);
            }
        }

        if let Some(v) = parse_env_number("FLOWKEY_MAX_RETRY_ATTEMPTS") {
            self.diagram.max_retry_attempts = v;
        }
        if let Some(v) = parse_env_number("FLOWKEY_GENERATION_TIMEOUT_MS") {
            self.diagram.generation_timeout_ms = v;
        }
        if let Some(v) = parse_env_number("FLOWKEY_MIN_SCRIPT_LENGTH") {
            self.diagram.min_script_length = v;
        }
        if let Some(v) = parse_env_number("FLOWKEY_MAX_SCRIPT_LENGTH") {
            self.diagram.max_script_length = v;
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> anyhow::Result<PathBuf> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("No config path"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let default_content = r#"# flowkey configuration file
# Location: ~/.flowkey/config.toml
#
# Environment variables override these settings.
# Run `flowkey config` to see current settings.

[provider]
# Any OpenAI-compatible chat completions endpoint
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
# Prefer the FLOWKEY_API_KEY (or OPENAI_API_KEY) environment variable
# api_key = "sk-..."
temperature = 0.2

[diagram]
# Attempts before giving up; each retry uses a simpler prompt
max_retry_attempts = 3
# Per-attempt timeout
generation_timeout_ms = 30000
# Accepted script length after trimming
min_script_length = 20
max_script_length = 5000
# Diagram keywords a script may start with
valid_diagram_types = [
  "flowchart", "graph", "sequencediagram", "classdiagram", "statediagram",
  "erdiagram", "journey", "gantt", "pie", "quadrantchart", "requirementdiagram",
  "gitgraph", "mindmap", "timeline", "zenuml", "sankey",
]
"#;

        std::fs::write(&path, default_content)?;
        Ok(path)
    }

    /// Human-readable summary of the effective settings
    pub fn display_string(&self) -> String {
        let path = Self::path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        format!(
            "**Configuration** (`{}`)\n\n\
             **Provider:**\n\
             - Base URL: {}\n\
             - Model: {}\n\
             - API key: {}\n\
             - Temperature: {}\n\n\
             **Diagram:**\n\
             - Max attempts: {}\n\
             - Timeout: {}ms\n\
             - Script length: {}..={}\n\
             - Diagram types: {}\n",
            path,
            self.provider.base_url,
            self.provider.model,
            if self.provider.api_key.is_some() {
                "set"
            } else {
                "missing"
            },
            self.provider.temperature,
            self.diagram.max_attempts(),
            self.diagram.generation_timeout_ms,
            self.diagram.min_script_length,
            self.diagram.max_script_length,
            self.diagram.valid_diagram_types.join(", "),
        )
    }
}

fn parse_env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            crate::logging::warn(&format!("Ignoring invalid {}={}", name, raw));
            None
        }
    }
}
