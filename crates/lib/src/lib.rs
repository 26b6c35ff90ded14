//! # docextract
//!
//! A field-extraction agent: it fetches the raw text of a document through a
//! tool call, asks a model for output constrained to a static field schema,
//! validates the answer and retries with feedback until it conforms. An
//! evaluation harness scores extracted values against reference data by
//! edit distance, optionally alongside a model-graded factuality check.
//!
//! Content fetchers for images (OCR) and PDFs live in the `docextract-ocr`
//! and `docextract-pdf` crates; this crate only defines the
//! [`ContentFetcher`] contract they implement.

pub mod agent;
pub mod config;
pub mod document;
pub mod errors;
pub mod eval;
pub mod executor;
pub mod factuality;
pub mod fetcher;
pub mod prompts;
pub mod providers;
pub mod schema;
pub mod scorer;
pub mod tools;

pub use agent::{AgentError, AgentSettings, ExtractionAgent, ExtractionRequest};
pub use config::{ConfigError, ProviderConfig, ProviderKind};
pub use document::{DocumentKind, DocumentRef, DocumentType};
pub use errors::{FetchError, PromptError};
pub use eval::{
    EvalError, EvaluationReport, Evaluator, FailureKind, HttpReferenceSource, Outcome,
    ReferenceSource, ScoreRecord,
};
pub use executor::AttemptFailure;
pub use factuality::{Factuality, FactualityChoice, FactualityError, FactualityScorer};
pub use fetcher::{ContentFetcher, FetcherRouter};
pub use providers::{ai::AiProvider, factory::create_provider};
pub use schema::{ExtractionResult, FieldSchema, FieldValue, ValidationFailure};
pub use tools::{AgentTool, ToolError, ToolSet};
