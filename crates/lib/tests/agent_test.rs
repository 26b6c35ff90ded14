//! # Extraction Agent Tests
//!
//! Exercises the retry loop, tool dispatch and error classification of
//! `ExtractionAgent` against scripted providers and in-memory fetchers.

mod common;

use common::{
    receipt_json, setup_tracing, tool_call, FixtureReaderProvider, MockAiProvider, SlowFetcher,
    SlowProvider, StaticFetcher,
};
use docextract::{
    executor::AttemptFailure,
    providers::ai::{Message, ModelTurn},
    tools::ToolError,
    AgentError, AgentSettings, DocumentRef, DocumentType, ExtractionAgent, ExtractionRequest,
    FailureKind, FieldValue,
};
use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

fn receipt_fetcher() -> Arc<StaticFetcher> {
    Arc::new(StaticFetcher::new(&[(
        "000",
        "ACME STORE\nCOMPANY: ACME STORE\nDATE: 01/02/2019\nTOTAL: 42.50\nTHANK YOU",
    )]))
}

fn request(field: &str) -> ExtractionRequest {
    ExtractionRequest::new(DocumentRef::image("000"), field)
}

#[tokio::test]
async fn test_golden_extraction_from_fetched_text() -> anyhow::Result<()> {
    setup_tracing();
    let provider = FixtureReaderProvider::new();
    let fetcher = receipt_fetcher();
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        fetcher.clone(),
    );

    let result = agent.extract(request("total")).await?;

    assert_eq!(result.get("total"), Some(&FieldValue::Present("42.50".into())));
    assert_eq!(
        result.get("company"),
        Some(&FieldValue::Present("ACME STORE".into()))
    );
    assert_eq!(result.get("address"), Some(&FieldValue::Absent));
    // One call to request the tool, one to answer.
    assert_eq!(provider.calls(), 2);
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_prompt_names_field_locator_and_tools() -> anyhow::Result<()> {
    let provider = MockAiProvider::new(vec![ModelTurn::Final(receipt_json(Some("1.00")))]);
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        receipt_fetcher(),
    );

    agent.extract(request("total")).await?;

    let sent = provider.request(0);
    assert_eq!(
        sent.messages[0],
        Message::User("What is the total in receipt index 000?".to_string())
    );
    let tool_names: Vec<&str> = sent.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tool_names, vec!["fetch_content", "lookup_field"]);
    let schema = sent.output_schema.expect("output schema is sent");
    assert_eq!(schema.name, "Receipt");
    assert!(sent.system_prompt.contains("total"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_field_fails_before_any_model_call() {
    let provider = MockAiProvider::new(vec![]);
    let fetcher = receipt_fetcher();
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        fetcher.clone(),
    );

    let err = agent.extract(request("tip")).await.unwrap_err();

    assert!(matches!(err, AgentError::Schema { ref field, schema: "Receipt" } if field == "tip"));
    assert_eq!(err.kind(), FailureKind::Schema);
    assert_eq!(provider.calls(), 0);
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transient_bad_output_recovers() -> anyhow::Result<()> {
    setup_tracing();
    let provider = MockAiProvider::new(vec![
        ModelTurn::ToolCalls(vec![tool_call("fetch_content")]),
        ModelTurn::Final("The total is 42.50".to_string()),
        ModelTurn::Final(format!("```json\n{}\n```", receipt_json(Some("42.50")))),
    ]);
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        receipt_fetcher(),
    );

    let result = agent.extract(request("total")).await?;

    assert_eq!(result.get("total"), Some(&FieldValue::Present("42.50".into())));
    assert_eq!(provider.calls(), 3);

    let retry = provider.request(2);
    let feedback = match retry.messages.last() {
        Some(Message::User(text)) => text.clone(),
        other => panic!("expected retry feedback, got {other:?}"),
    };
    assert!(feedback.starts_with("The previous output was invalid because"));
    // The fetched text stays in the conversation across attempts.
    assert!(retry
        .messages
        .iter()
        .any(|m| matches!(m, Message::Tool { content, .. } if content.contains("TOTAL: 42.50"))));
    Ok(())
}

#[tokio::test]
async fn test_persistent_bad_output_exhausts_retries() {
    let provider = MockAiProvider::new(vec![
        ModelTurn::Final("not json".to_string()),
        ModelTurn::Final("[1, 2]".to_string()),
        ModelTurn::Final(r#"{"total": "1.00"}"#.to_string()),
        ModelTurn::Final(receipt_json(Some("never reached"))),
    ]);
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        receipt_fetcher(),
    );

    let err = agent.extract(request("total")).await.unwrap_err();

    match &err {
        AgentError::ExtractionFailed { attempts, last } => {
            assert_eq!(*attempts, 3);
            assert!(matches!(last, AttemptFailure::Validation(_)));
            assert!(last.to_string().contains("missing"));
        }
        other => panic!("expected ExtractionFailed, got {other:?}"),
    }
    assert_eq!(err.kind(), FailureKind::Validation);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_zero_retries_invokes_model_once() {
    let provider = MockAiProvider::new(vec![
        ModelTurn::Final("nope".to_string()),
        ModelTurn::Final(receipt_json(Some("1.00"))),
    ]);
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        receipt_fetcher(),
    )
    .with_settings(AgentSettings {
        retries: 0,
        ..AgentSettings::default()
    });

    let err = agent.extract(request("total")).await.unwrap_err();

    assert!(matches!(err, AgentError::ExtractionFailed { attempts: 1, .. }));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_model_api_error_is_not_retried() {
    let provider = MockAiProvider::with_results(vec![
        Err("status 500: upstream unavailable".to_string()),
        Ok(ModelTurn::Final(receipt_json(Some("1.00")))),
    ]);
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        receipt_fetcher(),
    );

    let err = agent.extract(request("total")).await.unwrap_err();

    assert!(matches!(err, AgentError::Model(_)));
    assert_eq!(err.kind(), FailureKind::Model);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_fetch_failure_is_retried_then_reported() {
    setup_tracing();
    let provider = FixtureReaderProvider::new();
    let fetcher = Arc::new(StaticFetcher::new(&[]));
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        fetcher.clone(),
    );

    let err = agent.extract(request("total")).await.unwrap_err();

    assert!(matches!(
        err,
        AgentError::ExtractionFailed {
            attempts: 3,
            last: AttemptFailure::Tool(ToolError::Fetch(_))
        }
    ));
    assert_eq!(err.kind(), FailureKind::Fetch);
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 3);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_fetch_timeout_is_retried_then_reported_as_fetch() {
    setup_tracing();
    let provider = FixtureReaderProvider::new();
    let fetcher = Arc::new(SlowFetcher::new(Duration::from_secs(5)));
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        fetcher.clone(),
    )
    .with_settings(AgentSettings {
        retries: 1,
        max_tool_rounds: 4,
        timeout_secs: 1,
    });

    let err = agent.extract(request("total")).await.unwrap_err();

    match &err {
        AgentError::ExtractionFailed {
            attempts,
            last: AttemptFailure::Tool(ToolError::Timeout { tool, .. }),
        } => {
            assert_eq!(*attempts, 2);
            assert_eq!(tool, "fetch_content");
        }
        other => panic!("expected a fetch timeout, got {other:?}"),
    }
    assert_eq!(err.kind(), FailureKind::Fetch);
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_tool_round_limit_consumes_a_retry() -> anyhow::Result<()> {
    let provider = MockAiProvider::new(vec![
        ModelTurn::ToolCalls(vec![tool_call("lookup_field")]),
        ModelTurn::ToolCalls(vec![tool_call("lookup_field")]),
        ModelTurn::Final(receipt_json(Some("3.10"))),
    ]);
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        receipt_fetcher(),
    )
    .with_settings(AgentSettings {
        max_tool_rounds: 1,
        ..AgentSettings::default()
    });

    let result = agent.extract(request("total")).await?;

    assert_eq!(result.get("total"), Some(&FieldValue::Present("3.10".into())));
    assert_eq!(provider.calls(), 3);
    let second = provider.request(1);
    assert!(matches!(
        second.messages.last(),
        Some(Message::Tool { content, .. }) if content == "total"
    ));
    Ok(())
}

#[tokio::test]
async fn test_unknown_tool_is_reported_back_to_the_model() -> anyhow::Result<()> {
    let provider = MockAiProvider::new(vec![
        ModelTurn::ToolCalls(vec![tool_call("read_minds")]),
        ModelTurn::Final(receipt_json(None)),
    ]);
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Receipt,
        receipt_fetcher(),
    );

    let result = agent.extract(request("total")).await?;

    assert_eq!(result.get("total"), Some(&FieldValue::Absent));
    assert_eq!(provider.calls(), 2);
    assert!(matches!(
        provider.request(1).messages.last(),
        Some(Message::Tool { content, .. }) if content.starts_with("Error: Unknown tool 'read_minds'")
    ));
    Ok(())
}

#[tokio::test]
async fn test_model_timeout_is_a_retryable_failure() {
    let agent = ExtractionAgent::new(
        Arc::new(SlowProvider(Duration::from_secs(30))),
        DocumentType::Receipt,
        receipt_fetcher(),
    )
    .with_settings(AgentSettings {
        retries: 0,
        max_tool_rounds: 4,
        timeout_secs: 1,
    });

    let err = agent.extract(request("total")).await.unwrap_err();

    assert!(matches!(
        err,
        AgentError::ExtractionFailed {
            attempts: 1,
            last: AttemptFailure::ModelTimeout(_)
        }
    ));
    assert_eq!(err.kind(), FailureKind::Extraction);
}

#[tokio::test]
async fn test_contract_question_and_schema() -> anyhow::Result<()> {
    let provider = MockAiProvider::new(vec![ModelTurn::Final(
        serde_json::json!({
            "licensor": "Acme Licensing LLC",
            "licensee": "Widget Corp",
            "termination_clause": null,
            "signing_date": "2020-03-01",
        })
        .to_string(),
    )]);
    let agent = ExtractionAgent::new(
        Arc::new(provider.clone()),
        DocumentType::Contract,
        Arc::new(StaticFetcher::new(&[])),
    );

    let result = agent
        .extract(ExtractionRequest::new(
            DocumentRef::pdf("contracts/license.pdf"),
            "licensor",
        ))
        .await?;

    assert_eq!(
        result.get("licensor"),
        Some(&FieldValue::Present("Acme Licensing LLC".into()))
    );
    assert_eq!(
        provider.request(0).messages[0],
        Message::User("What is the licensor in the contract?".to_string())
    );
    Ok(())
}
