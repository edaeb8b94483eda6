//! Retry loop that turns a conversation into an accepted diagram or one terminal error.
//!
//! The loop is an explicit state machine. `next_state` is pure so the
//! accept/retry/fail decisions can be tested without any I/O; `generate`
//! drives it against an `AttemptExecutor`.

use super::clean::clean_with_types;
use super::error::{AttemptError, DiagramError, DiagramErrorKind};
use super::executor::AttemptExecutor;
use super::prompt::{PromptTier, select_prompt};
use super::validate::{ScriptValidator, ValidationIssue};
use super::{DiagramOutcome, is_no_diagram};
use crate::config::DiagramConfig;
use crate::conversation;
use crate::logging;
use crate::message::Message;
use crate::util::preview;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationState {
    Attempting(u32),
    Accepted(DiagramOutcome),
    Failed(DiagramError),
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationState::Attempting(_))
    }
}

/// What one attempt produced, before deciding where to go next
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The model said no diagram makes sense
    NoDiagram,
    Valid(super::DiagramScript),
    Invalid(ValidationIssue),
    Error(AttemptError),
}

/// Transition out of `Attempting(attempt)`
pub fn next_state(attempt: u32, max_attempts: u32, outcome: AttemptOutcome) -> GenerationState {
    let last = attempt >= max_attempts;
    match outcome {
        AttemptOutcome::NoDiagram => GenerationState::Accepted(DiagramOutcome::NoDiagram),
        AttemptOutcome::Valid(script) => GenerationState::Accepted(DiagramOutcome::Diagram(script)),
        AttemptOutcome::Invalid(_) if last => {
            GenerationState::Failed(DiagramErrorKind::ValidationFailed.into())
        }
        AttemptOutcome::Error(err) if last || err.is_fatal() => {
            GenerationState::Failed(DiagramError::from(&err))
        }
        AttemptOutcome::Invalid(_) | AttemptOutcome::Error(_) => {
            GenerationState::Attempting(attempt + 1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_config(&DiagramConfig::default())
    }
}

impl GenerationSettings {
    pub fn from_config(config: &DiagramConfig) -> Self {
        Self {
            max_attempts: config.max_attempts(),
            timeout: config.generation_timeout(),
        }
    }
}

/// Diagnostic record of one attempt. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationAttempt {
    pub index: u32,
    pub tier: PromptTier,
    pub prompt: String,
    pub raw: Option<String>,
    pub cleaned: Option<String>,
    pub valid: bool,
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub result: Result<DiagramOutcome, DiagramError>,
    pub attempts: Vec<GenerationAttempt>,
}

pub struct DiagramGenerator<E> {
    executor: E,
    validator: ScriptValidator,
    settings: GenerationSettings,
}

impl<E: AttemptExecutor> DiagramGenerator<E> {
    pub fn new(executor: E, validator: ScriptValidator, settings: GenerationSettings) -> Self {
        Self {
            executor,
            validator,
            settings,
        }
    }

    pub fn from_config(executor: E, config: &DiagramConfig) -> Self {
        Self::new(
            executor,
            ScriptValidator::from_config(config),
            GenerationSettings::from_config(config),
        )
    }

    pub async fn generate(&self, messages: &[Message]) -> Result<DiagramOutcome, DiagramError> {
        self.generate_with_report(messages).await.result
    }

    pub async fn generate_with_report(&self, messages: &[Message]) -> GenerationReport {
        let mut attempts = Vec::new();

        if !conversation::has_conversational_messages(messages) {
            logging::warn("Diagram requested with no user/assistant messages");
            return GenerationReport {
                result: Err(DiagramErrorKind::NoContent.into()),
                attempts,
            };
        }

        let transcript = conversation::transcript(messages);
        let (users, assistants) = conversation::role_counts(messages);
        logging::info(&format!(
            "Generating diagram: {} user / {} assistant messages, max {} attempts, timeout {}ms",
            users,
            assistants,
            self.settings.max_attempts,
            self.settings.timeout.as_millis()
        ));

        let mut state = GenerationState::Attempting(1);
        while !state.is_terminal() {
            if let GenerationState::Attempting(index) = state {
                let (record, outcome) = self.run_attempt(index, &transcript).await;
                attempts.push(record);
                state = next_state(index, self.settings.max_attempts, outcome);
            }
        }

        let result = match state {
            GenerationState::Accepted(outcome) => Ok(outcome),
            GenerationState::Failed(err) => {
                logging::error(&format!("Diagram generation failed: {}", err.kind.tag()));
                Err(err)
            }
            GenerationState::Attempting(_) => Err(DiagramErrorKind::GenerationFailed.into()),
        };

        GenerationReport { result, attempts }
    }

    async fn run_attempt(&self, index: u32, transcript: &str) -> (GenerationAttempt, AttemptOutcome) {
        let max = self.settings.max_attempts;
        let tier = PromptTier::for_attempt(index);
        let prompt = select_prompt(index, transcript);
        let mut record = GenerationAttempt {
            index,
            tier,
            prompt: prompt.clone(),
            raw: None,
            cleaned: None,
            valid: false,
            failure: None,
        };

        let raw = match self.executor.execute(&prompt, self.settings.timeout).await {
            Ok(raw) => raw,
            Err(err) => {
                logging::attempt(index, max, "error", &err.to_string());
                record.failure = Some(err.to_string());
                return (record, AttemptOutcome::Error(err));
            }
        };
        record.raw = Some(raw.clone());

        // Trusted as-is on any attempt; never cleaned or validated
        if is_no_diagram(&raw) {
            logging::attempt(index, max, "accepted", "NO_DIAGRAM");
            record.valid = true;
            return (record, AttemptOutcome::NoDiagram);
        }

        let cleaned = clean_with_types(&raw, self.validator.diagram_types());
        record.cleaned = Some(cleaned.clone());
        match self.validator.accept(&cleaned) {
            Ok(script) => {
                logging::attempt(index, max, "accepted", &format!("{} script", tier.label()));
                record.valid = true;
                (record, AttemptOutcome::Valid(script))
            }
            Err(issue) => {
                logging::attempt(
                    index,
                    max,
                    "rejected",
                    &format!("{}: {}", issue, preview(&cleaned, 120)),
                );
                record.failure = Some(issue.to_string());
                (record, AttemptOutcome::Invalid(issue))
            }
        }
    }
}
