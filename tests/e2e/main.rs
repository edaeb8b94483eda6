//! End-to-end tests for the diagram pipeline using a mock provider
//!
//! Each test drives `DiagramGenerator` through the real `ProviderExecutor`,
//! so streaming accumulation, timeouts, cleaning and validation all run.

mod mock_provider;

use anyhow::Result;
use flowkey::conversation::Conversation;
use flowkey::diagram::{
    self, DiagramErrorKind, DiagramGenerator, DiagramOutcome, GenerationSettings,
    ProviderExecutor, ScriptValidator,
};
use flowkey::message::{Message, Role, StreamEvent};
use flowkey::provider::{Provider, ProviderError};
use mock_provider::{MockProvider, Reply};
use std::sync::Arc;
use std::time::Duration;

const LOGIN_FLOW: &str = "flowchart TD\n    A[Open login page] --> B[Enter credentials]\n    B --> C{Valid?}\n    C -->|yes| D[Dashboard]\n    C -->|no| B";

const TIMEOUT: Duration = Duration::from_secs(30);

fn generator(provider: &Arc<MockProvider>) -> DiagramGenerator<ProviderExecutor> {
    let provider: Arc<dyn Provider> = provider.clone();
    DiagramGenerator::new(
        ProviderExecutor::new(provider),
        ScriptValidator::default(),
        GenerationSettings {
            max_attempts: 3,
            timeout: TIMEOUT,
        },
    )
}

fn login_request() -> Vec<Message> {
    vec![Message::user("I want a login flow")]
}

/// Valid script on the first attempt
#[tokio::test]
async fn test_valid_first_attempt() -> Result<()> {
    let provider = Arc::new(MockProvider::new());
    provider.queue_text(LOGIN_FLOW);

    let outcome = generator(&provider).generate(&login_request()).await;

    let Ok(DiagramOutcome::Diagram(script)) = outcome else {
        panic!("expected a diagram, got {:?}", outcome);
    };
    assert_eq!(script.as_str(), LOGIN_FLOW);
    assert_eq!(provider.calls(), 1);
    assert!(provider.prompts()[0].contains("user: I want a login flow"));

    let rendered = diagram::render(&script)?;
    assert_eq!(rendered.nodes.len(), 4);
    assert_eq!(rendered.edges.len(), 4);
    Ok(())
}

/// Garbage twice, then a fenced script with a chatty prefix
#[tokio::test]
async fn test_recovers_on_third_attempt() -> Result<()> {
    let provider = Arc::new(MockProvider::new());
    provider.queue_text("A login flow usually has a few steps, like entering a password.");
    provider.queue_text("flowchart TD\n    A[Open login --> B[Enter credentials]");
    provider.queue_text(&format!("Here is the diagram:\n```mermaid\n{}\n```", LOGIN_FLOW));

    let report = generator(&provider)
        .generate_with_report(&login_request())
        .await;

    let Ok(DiagramOutcome::Diagram(script)) = &report.result else {
        panic!("expected a diagram, got {:?}", report.result);
    };
    assert_eq!(script.as_str(), LOGIN_FLOW);
    assert_eq!(provider.calls(), 3);
    assert_eq!(report.attempts.len(), 3);
    assert!(report.attempts[..2].iter().all(|a| !a.valid));

    let prompts = provider.prompts();
    assert_ne!(prompts[0], prompts[2]);
    assert_ne!(prompts[1], prompts[2]);
    assert!(prompts.iter().all(|p| p.contains("I want a login flow")));
    Ok(())
}

/// Sentinel on the first attempt
#[tokio::test]
async fn test_no_diagram_sentinel() {
    let provider = Arc::new(MockProvider::new());
    provider.queue_text("NO_DIAGRAM");

    let report = generator(&provider)
        .generate_with_report(&[
            Message::user("hi"),
            Message::assistant("Hello! How can I help?"),
        ])
        .await;

    assert_eq!(report.result, Ok(DiagramOutcome::NoDiagram));
    assert_eq!(provider.calls(), 1);
    assert_eq!(report.attempts[0].cleaned, None);
}

/// Sentinel wrapped in a code fence, with and without a language tag
#[tokio::test]
async fn test_fenced_no_diagram_sentinel() {
    for reply in ["```\nNO_DIAGRAM\n```", "```mermaid\nNO_DIAGRAM\n```"] {
        let provider = Arc::new(MockProvider::new());
        provider.queue_text(reply);

        let report = generator(&provider)
            .generate_with_report(&login_request())
            .await;

        assert_eq!(report.result, Ok(DiagramOutcome::NoDiagram), "{}", reply);
        assert_eq!(provider.calls(), 1);
        assert_eq!(report.attempts[0].cleaned, None);
    }
}

/// Every attempt hangs; the run ends after three timeouts
#[tokio::test(start_paused = true)]
async fn test_all_attempts_time_out() {
    let provider = Arc::new(MockProvider::new());
    for _ in 0..3 {
        provider.queue(Reply::Hang);
    }

    let started = tokio::time::Instant::now();
    let outcome = generator(&provider).generate(&login_request()).await;
    let elapsed = started.elapsed();

    let err = outcome.unwrap_err();
    assert_eq!(err.kind, DiagramErrorKind::Timeout);
    assert_eq!(err.message, DiagramErrorKind::Timeout.message());
    assert_eq!(provider.calls(), 3);
    assert!(elapsed >= TIMEOUT * 3);
    assert!(elapsed < TIMEOUT * 3 + Duration::from_secs(1));
}

/// A reply that arrives after its attempt timed out never leaks into the result
#[tokio::test(start_paused = true)]
async fn test_late_reply_is_discarded() {
    let provider = Arc::new(MockProvider::new());
    provider.queue(Reply::Delayed(
        TIMEOUT + Duration::from_secs(5),
        vec![StreamEvent::TextDelta(
            "sequenceDiagram\n    participant Late\n    Late->>Late: too late".to_string(),
        )],
    ));
    provider.queue_text(LOGIN_FLOW);

    let report = generator(&provider)
        .generate_with_report(&login_request())
        .await;

    let Ok(DiagramOutcome::Diagram(script)) = &report.result else {
        panic!("expected a diagram, got {:?}", report.result);
    };
    assert_eq!(script.as_str(), LOGIN_FLOW);
    assert_eq!(report.attempts[0].raw, None);
    assert!(report.attempts[0].failure.as_deref().unwrap_or("").contains("timed out"));

    // Give the abandoned stream's timer a chance to fire; nothing changes
    tokio::time::sleep(TIMEOUT).await;
    assert_eq!(provider.calls(), 2);
}

/// No user/assistant messages: fail before any request
#[tokio::test]
async fn test_no_content_makes_no_requests() {
    let provider = Arc::new(MockProvider::new());
    provider.queue_text(LOGIN_FLOW);

    let outcome = generator(&provider)
        .generate(&[
            Message::system("You are helpful."),
            Message::diagram(LOGIN_FLOW),
        ])
        .await;

    assert_eq!(outcome, Err(DiagramErrorKind::NoContent.into()));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_authentication_failure_short_circuits() {
    let provider = Arc::new(MockProvider::new());
    provider.queue(Reply::Fail(ProviderError::from_status(
        401,
        "invalid api key",
        None,
    )));
    provider.queue_text(LOGIN_FLOW);

    let outcome = generator(&provider).generate(&login_request()).await;

    assert_eq!(outcome, Err(DiagramErrorKind::Authentication.into()));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let provider = Arc::new(MockProvider::new());
    provider.queue(Reply::Fail(ProviderError::from_status(429, "slow down", Some(1))));
    provider.queue_text(LOGIN_FLOW);

    let outcome = generator(&provider).generate(&login_request()).await;

    assert!(matches!(outcome, Ok(DiagramOutcome::Diagram(_))));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_last_error_decides_the_failure() {
    let provider = Arc::new(MockProvider::new());
    provider.queue(Reply::Fail(ProviderError::from_status(429, "slow down", None)));
    provider.queue_text("   ");
    provider.queue(Reply::Fail(ProviderError::Network(
        "connection reset".to_string(),
    )));

    let outcome = generator(&provider).generate(&login_request()).await;

    assert_eq!(outcome, Err(DiagramErrorKind::Network.into()));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_invalid_every_time_is_validation_failure() {
    let provider = Arc::new(MockProvider::new());
    for _ in 0..3 {
        provider.queue_text("I'm not sure how to draw that.");
    }

    let outcome = generator(&provider).generate(&login_request()).await;

    assert_eq!(outcome, Err(DiagramErrorKind::ValidationFailed.into()));
    assert_eq!(provider.calls(), 3);
}

/// Load a saved conversation, generate, append the diagram, reload
#[tokio::test]
async fn test_conversation_file_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("history.json");
    Conversation::new(vec![
        Message::user("I want a login flow"),
        Message::assistant("Sure: open page, enter credentials, check, dashboard."),
    ])
    .save(&path)?;

    let provider = Arc::new(MockProvider::new());
    provider.queue_text(&format!("```\n{}\n```", LOGIN_FLOW));

    let mut conversation = Conversation::load(&path)?;
    let outcome = generator(&provider)
        .generate(conversation.messages())
        .await;
    let Ok(DiagramOutcome::Diagram(script)) = outcome else {
        panic!("expected a diagram, got {:?}", outcome);
    };
    conversation.push_diagram(script.as_str());
    conversation.save(&path)?;

    let reloaded = Conversation::load(&path)?;
    assert_eq!(reloaded.messages().len(), 3);
    assert_eq!(reloaded.messages()[2].role, Role::Diagram);
    assert_eq!(reloaded.messages()[2].content, LOGIN_FLOW);
    assert!(!reloaded.transcript().contains("flowchart"));
    Ok(())
}
