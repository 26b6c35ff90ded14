//! # Factuality Scorer Tests
//!
//! Drives the model-graded check with scripted verdicts, on its own and
//! attached to the evaluation harness.

mod common;

use common::{
    setup_tracing, tool_call, FixtureReaderProvider, MockAiProvider, SlowProvider, StaticFetcher,
    StaticReferenceSource,
};
use docextract::{
    providers::ai::{Message, ModelTurn},
    DocumentRef, DocumentType, Evaluator, ExtractionAgent, FactualityChoice, FactualityError,
    FactualityScorer, Outcome,
};
use std::{sync::Arc, time::Duration};

fn verdict(choice: &str, reason: &str) -> ModelTurn {
    ModelTurn::Final(serde_json::json!({ "choice": choice, "reason": reason }).to_string())
}

fn judged_evaluator(judge: &MockAiProvider) -> Evaluator {
    let fetcher = Arc::new(StaticFetcher::new(&[
        ("000", "COMPANY: ACME STORE\nTOTAL: 42.50"),
        ("002", "COMPANY: BOOK TA.K\nTOTAL: 10.01"),
    ]));
    let references = Arc::new(StaticReferenceSource::new(&[
        ("000", &[("total", "42.50")]),
        ("001", &[("total", "9.00")]),
        ("002", &[("total", "10.00")]),
    ]));
    let agent = ExtractionAgent::new(
        Arc::new(FixtureReaderProvider::new()),
        DocumentType::Receipt,
        fetcher,
    );
    Evaluator::new(agent, references)
        .with_concurrency(1)
        .with_factuality(FactualityScorer::new(Arc::new(judge.clone())))
}

#[tokio::test]
async fn test_json_verdict_is_graded() -> anyhow::Result<()> {
    let judge = MockAiProvider::new(vec![verdict("B", "Adds the currency.")]);
    let scorer = FactualityScorer::new(Arc::new(judge.clone()));

    let grade = scorer
        .grade("What is the total in receipt index 000?", "42.50", "RM 42.50")
        .await?;

    assert_eq!(grade.choice, FactualityChoice::B);
    assert_eq!(grade.score, 0.6);
    assert_eq!(grade.reason.as_deref(), Some("Adds the currency."));

    let request = judge.request(0);
    assert!(request.tools.is_empty());
    assert_eq!(
        request.output_schema.as_ref().map(|s| s.name.as_str()),
        Some("factuality_verdict")
    );
    match request.messages.as_slice() {
        [Message::User(prompt)] => {
            assert!(prompt.contains("[Question]: What is the total in receipt index 000?"));
            assert!(prompt.contains("[Expert]: 42.50"));
            assert!(prompt.contains("[Submission]: RM 42.50"));
        }
        other => panic!("expected a single user message, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_fenced_verdict_and_bare_letter_are_accepted() -> anyhow::Result<()> {
    let judge = MockAiProvider::new(vec![
        ModelTurn::Final("```json\n{\"choice\": \"e\", \"reason\": \"\"}\n```".to_string()),
        ModelTurn::Final(" (D) ".to_string()),
    ]);
    let scorer = FactualityScorer::new(Arc::new(judge));

    let fenced = scorer.grade("q", "ACME STORE", "Acme Store").await?;
    assert_eq!(fenced.choice, FactualityChoice::E);
    assert_eq!(fenced.score, 1.0);
    assert_eq!(fenced.reason, None);

    let bare = scorer.grade("q", "42.50", "9.00").await?;
    assert_eq!(bare.choice, FactualityChoice::D);
    assert_eq!(bare.score, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_unusable_answers_are_errors() {
    let judge = MockAiProvider::with_results(vec![
        Ok(verdict("Z", "no such option")),
        Ok(ModelTurn::ToolCalls(vec![tool_call("fetch_content")])),
        Err("rate limited".to_string()),
    ]);
    let scorer = FactualityScorer::new(Arc::new(judge));

    let err = scorer.grade("q", "a", "b").await.unwrap_err();
    assert!(matches!(err, FactualityError::InvalidVerdict(ref m) if m.contains("'Z'")));
    let err = scorer.grade("q", "a", "b").await.unwrap_err();
    assert!(matches!(err, FactualityError::UnexpectedToolCalls));
    let err = scorer.grade("q", "a", "b").await.unwrap_err();
    assert!(matches!(err, FactualityError::Model(_)));
}

#[tokio::test]
async fn test_slow_judge_times_out() {
    let scorer = FactualityScorer::new(Arc::new(SlowProvider(Duration::from_secs(30))))
        .with_timeout(Duration::from_millis(50));

    let err = scorer.grade("q", "a", "b").await.unwrap_err();

    assert!(matches!(err, FactualityError::Timeout(d) if d == Duration::from_millis(50)));
}

#[tokio::test]
async fn test_evaluator_records_grades_next_to_distance() -> anyhow::Result<()> {
    setup_tracing();
    let judge = MockAiProvider::new(vec![
        verdict("C", "Same amount."),
        verdict("D", "Different amount."),
    ]);
    let documents = ["000", "001", "002"].map(DocumentRef::image);

    let report = judged_evaluator(&judge)
        .evaluate(&documents, &["total".to_string()])
        .await?;

    // The unfetchable receipt is never graded.
    assert_eq!(judge.calls(), 2);
    let records: Vec<_> = report.records().collect();
    assert_eq!(
        records[0].outcome,
        Outcome::Scored {
            distance: 0,
            similarity: 1.0
        }
    );
    assert_eq!(records[0].factuality_score(), Some(1.0));
    assert!(records[1].is_failure());
    assert_eq!(records[1].factuality, None);
    assert_eq!(records[2].distance(), Some(1));
    assert_eq!(
        records[2].factuality.as_ref().map(|f| f.choice),
        Some(FactualityChoice::D)
    );

    let summary = &report.summary[0];
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.graded, 2);
    assert_eq!(summary.mean_factuality, Some(0.5));

    let rendered = report.render();
    assert!(rendered.contains("MEAN FACTUALITY"));
    assert!(rendered.contains("C=1.00"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(json["documents"][0]["records"][0]["factuality"]["choice"], "C");
    assert!(json["documents"][1]["records"][0].get("factuality").is_none());
    Ok(())
}

#[tokio::test]
async fn test_grading_failure_keeps_the_distance_score() -> anyhow::Result<()> {
    let judge = MockAiProvider::with_results(vec![Err("judge unavailable".to_string())]);

    let report = judged_evaluator(&judge)
        .evaluate(&[DocumentRef::image("000")], &["total".to_string()])
        .await?;

    let record = report.records().next().expect("one record");
    assert_eq!(record.distance(), Some(0));
    assert_eq!(record.factuality, None);
    assert_eq!(report.summary[0].graded, 0);
    assert_eq!(report.summary[0].mean_factuality, None);
    Ok(())
}
