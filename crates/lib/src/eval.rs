//! # Evaluation Harness
//!
//! Runs an [`ExtractionAgent`] over a batch of documents and fields, scores
//! every produced value against reference data and groups the resulting
//! [`ScoreRecord`]s into an [`EvaluationReport`].
//!
//! A failure for one (document, field) pair never aborts the batch; it is
//! recorded as a [`Outcome::Failed`] entry instead. With a
//! [`FactualityScorer`] attached, every scored value is also graded by a
//! model; a grading failure leaves the edit-distance score in place.

use crate::{
    agent::{ExtractionAgent, ExtractionRequest},
    document::{DocumentKind, DocumentRef},
    errors::FetchError,
    factuality::{Factuality, FactualityScorer},
    schema::FieldValue,
    scorer::{score_values, similarity_values},
};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, fmt, fmt::Debug, fmt::Write as _, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Field '{field}' is not declared in the {schema} schema")]
    Schema { field: String, schema: &'static str },
}

/// Supplies ground-truth field values for a document.
#[async_trait]
pub trait ReferenceSource: Send + Sync + Debug {
    async fn load(&self, document: &DocumentRef) -> Result<HashMap<String, String>, FetchError>;
}

/// Reads reference values from `GET {base_url}/key/{index}.json`.
#[derive(Debug, Clone)]
pub struct HttpReferenceSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReferenceSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, index: &str) -> String {
        format!("{}/key/{}.json", self.base_url.trim_end_matches('/'), index)
    }
}

#[async_trait]
impl ReferenceSource for HttpReferenceSource {
    #[instrument(skip(self, document), fields(document = %document))]
    async fn load(&self, document: &DocumentRef) -> Result<HashMap<String, String>, FetchError> {
        if document.kind() != DocumentKind::Image {
            return Err(FetchError::UnsupportedKind(document.kind()));
        }
        let url = self.url_for(document.locator());
        debug!("--> Loading reference values from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let body: Value = response.json().await.map_err(|e| FetchError::Decode {
            locator: url.clone(),
            message: e.to_string(),
        })?;

        match body {
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(field, value)| (field, reference_text(value)))
                .collect()),
            other => Err(FetchError::Decode {
                locator: url,
                message: format!("expected a JSON object, got {other}"),
            }),
        }
    }
}

fn reference_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Why a (document, field) pair could not be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Fetch,
    Schema,
    Validation,
    Extraction,
    Model,
    Reference,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Fetch => "fetch",
            FailureKind::Schema => "schema",
            FailureKind::Validation => "validation",
            FailureKind::Extraction => "extraction",
            FailureKind::Model => "model",
            FailureKind::Reference => "reference",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Scored { distance: usize, similarity: f64 },
    Failed { kind: FailureKind, message: String },
}

/// The result of evaluating one field of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub document: DocumentRef,
    pub field: String,
    pub produced: Option<FieldValue>,
    pub reference: Option<String>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factuality: Option<Factuality>,
}

impl ScoreRecord {
    pub fn distance(&self) -> Option<usize> {
        match self.outcome {
            Outcome::Scored { distance, .. } => Some(distance),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn factuality_score(&self) -> Option<f64> {
        self.factuality.as_ref().map(|f| f.score)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    pub document: DocumentRef,
    pub records: Vec<ScoreRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub field: String,
    pub scored: usize,
    pub failed: usize,
    /// `None` when no record for the field was scored.
    pub mean_distance: Option<f64>,
    pub mean_similarity: Option<f64>,
    /// Records that carry a factuality grade.
    pub graded: usize,
    pub mean_factuality: Option<f64>,
}

/// Score records grouped by document, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub documents: Vec<DocumentReport>,
    pub summary: Vec<FieldSummary>,
}

impl EvaluationReport {
    fn new(documents: Vec<DocumentReport>, fields: &[String]) -> Self {
        let summary = fields
            .iter()
            .map(|field| summarize(field, &documents))
            .collect();
        Self { documents, summary }
    }

    pub fn records(&self) -> impl Iterator<Item = &ScoreRecord> {
        self.documents.iter().flat_map(|d| d.records.iter())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Renders the report as a plain-text table followed by the per-field summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<14} {:<20} {:<30} {:<30} RESULT",
            "DOCUMENT", "FIELD", "PRODUCED", "REFERENCE"
        );
        for record in self.records() {
            let produced = record
                .produced
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            let reference = record.reference.as_deref().unwrap_or("-");
            let result = match &record.outcome {
                Outcome::Scored {
                    distance,
                    similarity,
                } => match &record.factuality {
                    Some(f) => format!("{distance} ({similarity:.2}) {}={:.2}", f.choice, f.score),
                    None => format!("{distance} ({similarity:.2})"),
                },
                Outcome::Failed { kind, message } => format!("FAILED({kind}): {message}"),
            };
            let _ = writeln!(
                out,
                "{:<14} {:<20} {:<30} {:<30} {}",
                record.document.to_string(),
                record.field,
                clip(&produced, 30),
                clip(reference, 30),
                result
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<20} {:>6} {:>6} {:>13} {:>15} {:>16}",
            "FIELD", "SCORED", "FAILED", "MEAN DISTANCE", "MEAN SIMILARITY", "MEAN FACTUALITY"
        );
        for summary in &self.summary {
            let _ = writeln!(
                out,
                "{:<20} {:>6} {:>6} {:>13} {:>15} {:>16}",
                summary.field,
                summary.scored,
                summary.failed,
                summary
                    .mean_distance
                    .map(|d| format!("{d:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
                summary
                    .mean_similarity
                    .map(|s| format!("{s:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
                summary
                    .mean_factuality
                    .map(|s| format!("{s:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        out
    }
}

fn summarize(field: &str, documents: &[DocumentReport]) -> FieldSummary {
    let records = documents
        .iter()
        .flat_map(|d| d.records.iter())
        .filter(|r| r.field == field);

    let mut scored = 0;
    let mut failed = 0;
    let mut distance_sum = 0.0;
    let mut similarity_sum = 0.0;
    let mut graded = 0;
    let mut factuality_sum = 0.0;
    for record in records {
        if let Some(score) = record.factuality_score() {
            graded += 1;
            factuality_sum += score;
        }
        match record.outcome {
            Outcome::Scored {
                distance,
                similarity,
            } => {
                scored += 1;
                distance_sum += distance as f64;
                similarity_sum += similarity;
            }
            Outcome::Failed { .. } => failed += 1,
        }
    }

    let mean = |sum: f64| (scored > 0).then(|| sum / scored as f64);
    FieldSummary {
        field: field.to_string(),
        scored,
        failed,
        mean_distance: mean(distance_sum),
        mean_similarity: mean(similarity_sum),
        graded,
        mean_factuality: (graded > 0).then(|| factuality_sum / graded as f64),
    }
}

fn clip(text: &str, width: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= width {
        return single_line;
    }
    let mut clipped: String = single_line.chars().take(width.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

/// Scores an extraction agent against a reference source.
#[derive(Debug, Clone)]
pub struct Evaluator {
    agent: ExtractionAgent,
    references: Arc<dyn ReferenceSource>,
    concurrency: usize,
    factuality: Option<FactualityScorer>,
}

impl Evaluator {
    pub fn new(agent: ExtractionAgent, references: Arc<dyn ReferenceSource>) -> Self {
        Self {
            agent,
            references,
            concurrency: DEFAULT_CONCURRENCY,
            factuality: None,
        }
    }

    /// Also grades every scored value with a model.
    pub fn with_factuality(mut self, scorer: FactualityScorer) -> Self {
        self.factuality = Some(scorer);
        self
    }

    /// Caps the number of (document, field) pairs in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[instrument(skip_all, fields(documents = documents.len(), requested = ?fields))]
    pub async fn evaluate(
        &self,
        documents: &[DocumentRef],
        fields: &[String],
    ) -> Result<EvaluationReport, EvalError> {
        let schema = self.agent.document_type().schema();
        if let Some(field) = fields.iter().find(|f| !schema.contains(f)) {
            return Err(EvalError::Schema {
                field: field.clone(),
                schema: schema.name,
            });
        }

        // One reference load per document, however many fields are requested.
        let mut references: Vec<Option<Result<HashMap<String, String>, FetchError>>> =
            (0..documents.len()).map(|_| None).collect();
        let mut loads = stream::iter(documents.iter().enumerate())
            .map(move |(index, document)| async move {
                (index, self.references.load(document).await)
            })
            .buffer_unordered(self.concurrency);
        while let Some((index, loaded)) = loads.next().await {
            references[index] = Some(loaded);
        }
        drop(loads);

        let total = documents.len() * fields.len();
        let mut slots: Vec<Vec<Option<ScoreRecord>>> =
            documents.iter().map(|_| vec![None; fields.len()]).collect();

        let pairs = documents.iter().enumerate().flat_map(|(d, document)| {
            fields
                .iter()
                .enumerate()
                .map(move |(f, field)| (d, f, document, field))
        });
        let references = &references;
        let mut runs = stream::iter(pairs)
            .map(move |(d, f, document, field)| async move {
                let record = match references[d].as_ref() {
                    Some(Ok(values)) => self.score_pair(document, field, values).await,
                    Some(Err(e)) => failed_record(
                        document,
                        field,
                        None,
                        FailureKind::Reference,
                        e.to_string(),
                    ),
                    None => failed_record(
                        document,
                        field,
                        None,
                        FailureKind::Reference,
                        "reference data was not loaded".to_string(),
                    ),
                };
                (d, f, record)
            })
            .buffer_unordered(self.concurrency);

        let mut completed = 0;
        while let Some((d, f, record)) = runs.next().await {
            completed += 1;
            info!(
                completed,
                total,
                document = %record.document,
                field = %record.field,
                failed = record.is_failure(),
                "Evaluated field"
            );
            slots[d][f] = Some(record);
        }
        drop(runs);

        let reports = documents
            .iter()
            .zip(slots)
            .map(|(document, records)| DocumentReport {
                document: document.clone(),
                records: records.into_iter().flatten().collect(),
            })
            .collect();
        Ok(EvaluationReport::new(reports, fields))
    }

    async fn score_pair(
        &self,
        document: &DocumentRef,
        field: &str,
        references: &HashMap<String, String>,
    ) -> ScoreRecord {
        let reference = references.get(field).cloned();
        let request = ExtractionRequest::new(document.clone(), field);
        match self.agent.extract(request).await {
            Ok(result) => {
                let produced = result.get(field).cloned();
                let distance = score_values(produced.as_ref(), reference.as_deref());
                let similarity = similarity_values(produced.as_ref(), reference.as_deref());
                let factuality = self
                    .grade(document, field, produced.as_ref(), reference.as_deref())
                    .await;
                ScoreRecord {
                    document: document.clone(),
                    field: field.to_string(),
                    produced,
                    reference,
                    outcome: Outcome::Scored {
                        distance,
                        similarity,
                    },
                    factuality,
                }
            }
            Err(e) => failed_record(document, field, reference, e.kind(), e.to_string()),
        }
    }

    /// Grades a scored value when both a scorer and a reference are available.
    async fn grade(
        &self,
        document: &DocumentRef,
        field: &str,
        produced: Option<&FieldValue>,
        reference: Option<&str>,
    ) -> Option<Factuality> {
        let scorer = self.factuality.as_ref()?;
        let reference = reference?;
        let question = self.agent.document_type().question(field, document);
        let submission = produced.and_then(FieldValue::as_str).unwrap_or("null");
        match scorer.grade(&question, reference, submission).await {
            Ok(factuality) => Some(factuality),
            Err(e) => {
                warn!(document = %document, field, error = %e, "Factuality grading failed");
                None
            }
        }
    }
}

fn failed_record(
    document: &DocumentRef,
    field: &str,
    reference: Option<String>,
    kind: FailureKind,
    message: String,
) -> ScoreRecord {
    ScoreRecord {
        document: document.clone(),
        field: field.to_string(),
        produced: None,
        reference,
        outcome: Outcome::Failed { kind, message },
        factuality: None,
    }
}
