//! # Factuality Scorer
//!
//! An optional model-graded check that runs next to the edit-distance scorer.
//! The model is shown the extraction question, the reference value and the
//! produced value, and picks one of five comparison options. Each option maps
//! to a fixed score between 0 and 1.

use crate::{
    errors::PromptError,
    prompts::factuality::{build_factuality_prompt, FACTUALITY_SYSTEM_PROMPT},
    providers::ai::{AiProvider, ChatRequest, Message, ModelTurn, OutputSchema},
    schema::parse_json_output,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_FACTUALITY_TIMEOUT_SECS: u64 = 60;

/// The comparison option picked by the grading model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FactualityChoice {
    /// Subset of the reference, consistent with it.
    A,
    /// Superset of the reference, consistent with it.
    B,
    /// Same details as the reference.
    C,
    /// Disagrees with the reference.
    D,
    /// Differs in ways that do not affect the facts.
    E,
}

impl FactualityChoice {
    pub fn score(self) -> f64 {
        match self {
            FactualityChoice::A => 0.4,
            FactualityChoice::B => 0.6,
            FactualityChoice::C | FactualityChoice::E => 1.0,
            FactualityChoice::D => 0.0,
        }
    }
}

impl FromStr for FactualityChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let letter = s.trim().trim_start_matches('(').trim_end_matches(')');
        match letter.to_ascii_uppercase().as_str() {
            "A" => Ok(FactualityChoice::A),
            "B" => Ok(FactualityChoice::B),
            "C" => Ok(FactualityChoice::C),
            "D" => Ok(FactualityChoice::D),
            "E" => Ok(FactualityChoice::E),
            _ => Err(format!("'{s}' is not one of A, B, C, D or E")),
        }
    }
}

impl fmt::Display for FactualityChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A graded comparison of one produced value against its reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factuality {
    pub choice: FactualityChoice,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Error, Debug)]
pub enum FactualityError {
    #[error(transparent)]
    Model(#[from] PromptError),
    #[error("Grading model did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Grading model asked for tools instead of answering")]
    UnexpectedToolCalls,
    #[error("Grading model gave an unusable verdict: {0}")]
    InvalidVerdict(String),
}

/// Grades produced values with a model, one request per value.
#[derive(Debug, Clone)]
pub struct FactualityScorer {
    provider: Arc<dyn AiProvider>,
    timeout: Duration,
}

impl FactualityScorer {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self {
            provider,
            timeout: Duration::from_secs(DEFAULT_FACTUALITY_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Asks the model how `submission` compares to `expert` as an answer to `question`.
    #[instrument(name = "grading factuality", skip_all)]
    pub async fn grade(
        &self,
        question: &str,
        expert: &str,
        submission: &str,
    ) -> Result<Factuality, FactualityError> {
        let request = ChatRequest {
            system_prompt: FACTUALITY_SYSTEM_PROMPT.to_string(),
            messages: vec![Message::User(build_factuality_prompt(
                question, expert, submission,
            ))],
            tools: vec![],
            output_schema: Some(verdict_schema()),
        };

        let turn = tokio::time::timeout(self.timeout, self.provider.chat(&request))
            .await
            .map_err(|_| FactualityError::Timeout(self.timeout))??;
        let text = match turn {
            ModelTurn::Final(text) => text,
            ModelTurn::ToolCalls(_) => return Err(FactualityError::UnexpectedToolCalls),
        };
        debug!("<-- Factuality verdict: {}", text);
        parse_verdict(&text)
    }
}

fn verdict_schema() -> OutputSchema {
    OutputSchema {
        name: "factuality_verdict".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "choice": {"type": "string", "enum": ["A", "B", "C", "D", "E"]},
                "reason": {"type": "string"}
            },
            "required": ["choice", "reason"],
            "additionalProperties": false
        }),
    }
}

/// Accepts the JSON verdict, or a bare option letter.
fn parse_verdict(text: &str) -> Result<Factuality, FactualityError> {
    if let Ok(choice) = text.parse::<FactualityChoice>() {
        return Ok(Factuality {
            choice,
            score: choice.score(),
            reason: None,
        });
    }

    let value =
        parse_json_output(text).map_err(|e| FactualityError::InvalidVerdict(e.to_string()))?;
    let choice = value
        .get("choice")
        .and_then(Value::as_str)
        .ok_or_else(|| FactualityError::InvalidVerdict("missing 'choice'".to_string()))?
        .parse::<FactualityChoice>()
        .map_err(FactualityError::InvalidVerdict)?;
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|r| !r.is_empty());

    Ok(Factuality {
        choice,
        score: choice.score(),
        reason,
    })
}
