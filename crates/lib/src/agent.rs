//! # Extraction Agent
//!
//! Orchestrates one structured-extraction request: it binds the content
//! fetcher and the requested field as tools, asks the model for an object
//! matching the document type's schema, validates the answer and feeds any
//! failure back to the model until the retry bound is exhausted.

use crate::{
    document::{DocumentRef, DocumentType},
    errors::PromptError,
    eval::FailureKind,
    executor::{AttemptFailure, Conversation, ConversationLimits, TurnError},
    fetcher::ContentFetcher,
    prompts::extraction::{build_extraction_system_prompt, build_retry_feedback},
    providers::ai::{AiProvider, OutputSchema},
    schema::ExtractionResult,
    tools::{FetchContentTool, LookupFieldTool, ToolError, ToolSet},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Tuning knobs for an [`ExtractionAgent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// How many times a retryable failure may be answered with another attempt.
    pub retries: usize,
    /// Tool-call rounds allowed within one attempt.
    pub max_tool_rounds: usize,
    /// Bounds each model call and each tool call independently.
    pub timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            retries: 2,
            max_tool_rounds: 4,
            timeout_secs: 60,
        }
    }
}

impl AgentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn limits(&self) -> ConversationLimits {
        ConversationLimits {
            max_tool_rounds: self.max_tool_rounds,
            timeout: self.timeout(),
        }
    }
}

/// One field of one document to extract. Consumed by [`ExtractionAgent::extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub document: DocumentRef,
    pub field: String,
}

impl ExtractionRequest {
    pub fn new(document: DocumentRef, field: impl Into<String>) -> Self {
        Self {
            document,
            field: field.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    /// The caller asked for a field the schema does not declare.
    #[error("Field '{field}' is not declared in the {schema} schema")]
    Schema { field: String, schema: &'static str },
    #[error("Extraction failed after {attempts} attempt(s): {last}")]
    ExtractionFailed { attempts: usize, last: AttemptFailure },
    #[error("Model invocation failed: {0}")]
    Model(#[from] PromptError),
}

impl AgentError {
    /// Classifies the error for a [`ScoreRecord`](crate::eval::ScoreRecord).
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::Schema { .. } => FailureKind::Schema,
            AgentError::ExtractionFailed { last, .. } => match last {
                AttemptFailure::Tool(ToolError::Fetch(_)) => FailureKind::Fetch,
                AttemptFailure::Tool(ToolError::Timeout { tool, .. })
                    if tool == FetchContentTool::NAME =>
                {
                    FailureKind::Fetch
                }
                AttemptFailure::Validation(_) => FailureKind::Validation,
                _ => FailureKind::Extraction,
            },
            AgentError::Model(_) => FailureKind::Model,
        }
    }
}

/// Extracts fields of one document type. Built once and shared; it holds no
/// per-request state.
#[derive(Debug, Clone)]
pub struct ExtractionAgent {
    provider: Arc<dyn AiProvider>,
    document_type: DocumentType,
    fetcher: Arc<dyn ContentFetcher>,
    settings: AgentSettings,
}

impl ExtractionAgent {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        document_type: DocumentType,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        Self {
            provider,
            document_type,
            fetcher,
            settings: AgentSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Extracts the requested field (and any other field the model can read)
    /// from one document.
    #[instrument(skip(self), fields(document = %request.document, field = %request.field))]
    pub async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionResult, AgentError> {
        let schema = self.document_type.schema();
        if !schema.contains(&request.field) {
            return Err(AgentError::Schema {
                field: request.field,
                schema: schema.name,
            });
        }

        let tools = ToolSet::new()
            .with(Arc::new(FetchContentTool::new(
                self.fetcher.clone(),
                request.document.clone(),
            )))
            .with(Arc::new(LookupFieldTool::new(request.field.clone())));

        let system_prompt =
            build_extraction_system_prompt(self.document_type.system_prompt(), &schema.describe());
        let question = self
            .document_type
            .question(&request.field, &request.document);
        let output_schema = OutputSchema {
            name: schema.name.to_string(),
            schema: schema.json_schema(),
        };

        let mut conversation = Conversation::new(
            self.provider.as_ref(),
            &tools,
            system_prompt,
            question,
            Some(output_schema),
            self.settings.limits(),
        );

        let max_attempts = self.settings.retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match conversation.next_answer().await {
                Ok(answer) => match schema.validate_output(&answer) {
                    Ok(result) => {
                        info!(
                            attempts = attempt,
                            model_calls = conversation.model_calls(),
                            "Extraction succeeded"
                        );
                        return Ok(result);
                    }
                    Err(invalid) => AttemptFailure::Validation(invalid),
                },
                Err(TurnError::Model(e)) => return Err(AgentError::Model(e)),
                Err(TurnError::Retryable(failure)) => failure,
            };

            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %failure, "Retries exhausted");
                return Err(AgentError::ExtractionFailed {
                    attempts: attempt,
                    last: failure,
                });
            }

            warn!(
                attempt = attempt,
                max_attempts = max_attempts,
                error = %failure,
                "Attempt failed, retrying"
            );
            conversation.push_user(build_retry_feedback(&failure.to_string()));
        }
    }
}
