//! # docextract-search: Web Search Tool and Agent
//!
//! A `search_web` tool backed by the Brave Search API, and a small agent that
//! answers questions with it using the same tool-calling loop as the
//! extraction agent.

use async_trait::async_trait;
use docextract::{
    errors::PromptError,
    executor::{AttemptFailure, Conversation, ConversationLimits, TurnError},
    prompts::search::WEB_SEARCH_SYSTEM_PROMPT,
    providers::ai::AiProvider,
    tools::{AgentTool, ToolError, ToolSet},
    AgentSettings,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info_span, instrument, warn, Instrument};

pub const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Returned instead of real results when no Brave API key is configured.
pub const TEST_SEARCH_RESULT: &str =
    "This is a test web search result. Please provide a Brave API key to get real search results.";

pub const NO_RESULTS: &str = "No results found for the query.";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Brave search request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Brave search returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode Brave search response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum SearchAgentError {
    #[error("Model invocation failed: {0}")]
    Model(#[from] PromptError),
    #[error("No answer after {attempts} attempt(s): {last}")]
    NoAnswer { attempts: usize, last: AttemptFailure },
}

// --- Brave API response structures ---

#[derive(Deserialize, Debug, Default)]
struct BraveResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Deserialize, Debug, Default)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Deserialize, Debug, Default)]
struct WebResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
}

/// Formats the first three results, skipping any without a title or summary.
fn format_results(results: &[WebResult]) -> String {
    let formatted: Vec<String> = results
        .iter()
        .take(3)
        .filter(|r| !r.title.is_empty() && !r.description.is_empty())
        .map(|r| {
            format!(
                "Title: {}\nSummary: {}\nSource: {}\n",
                r.title, r.description, r.url
            )
        })
        .collect();

    if formatted.is_empty() {
        NO_RESULTS.to_string()
    } else {
        formatted.join("\n")
    }
}

// --- Search Tool ---

/// The `search_web` tool.
#[derive(Debug, Clone)]
pub struct BraveSearchTool {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl BraveSearchTool {
    pub const NAME: &'static str = "search_web";

    /// Without an API key the tool answers with [`TEST_SEARCH_RESULT`].
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: BRAVE_SEARCH_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Runs one web search and formats the results for the model.
    pub async fn search(&self, web_query: &str) -> Result<String, SearchError> {
        let Some(api_key) = &self.api_key else {
            return Ok(TEST_SEARCH_RESULT.to_string());
        };

        let span = info_span!("calling Brave search API", query = %web_query);
        async {
            debug!("--> WEB QUERY: {}", web_query);
            let response = self
                .client
                .get(&self.endpoint)
                .header("X-Subscription-Token", api_key)
                .header("Accept", "application/json")
                .query(&[
                    ("q", web_query),
                    ("count", "5"),
                    ("text_decorations", "true"),
                    ("search_lang", "en"),
                ])
                .send()
                .await
                .map_err(SearchError::Request)?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(SearchError::Status { status, body });
            }

            let data: BraveResponse = response.json().await.map_err(SearchError::Decode)?;
            let results = data.web.map(|w| w.results).unwrap_or_default();
            debug!("<-- Brave returned {} web result(s)", results.len());
            Ok::<_, SearchError>(format_results(&results))
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl AgentTool for BraveSearchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search the web given a query defined to answer the user's question. \
         Returns the search results as a formatted string."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "web_query": {
                    "type": "string",
                    "description": "The query for the web search."
                }
            },
            "required": ["web_query"],
            "additionalProperties": false,
        })
    }

    async fn call(&self, arguments: &Value) -> Result<String, ToolError> {
        let web_query = arguments
            .get("web_query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: Self::NAME.to_string(),
                message: "expected a string argument 'web_query'".to_string(),
            })?;
        self.search(web_query)
            .await
            .map_err(|e| ToolError::Failed {
                tool: Self::NAME.to_string(),
                message: e.to_string(),
            })
    }
}

// --- Search Agent ---

/// Builds the system prompt for a given date.
pub fn web_search_system_prompt(date: chrono::NaiveDate) -> String {
    WEB_SEARCH_SYSTEM_PROMPT.replace("{date}", &date.format("%Y-%m-%d").to_string())
}

/// Answers free-form questions, researching them with `search_web`.
#[derive(Debug, Clone)]
pub struct WebSearchAgent {
    provider: Arc<dyn AiProvider>,
    tools: ToolSet,
    settings: AgentSettings,
}

impl WebSearchAgent {
    pub fn new(provider: Arc<dyn AiProvider>, search: BraveSearchTool) -> Self {
        Self {
            provider,
            tools: ToolSet::new().with(Arc::new(search)),
            settings: AgentSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<String, SearchAgentError> {
        let today = chrono::Local::now().date_naive();
        let mut conversation = Conversation::new(
            self.provider.as_ref(),
            &self.tools,
            web_search_system_prompt(today),
            question.to_string(),
            None,
            ConversationLimits {
                max_tool_rounds: self.settings.max_tool_rounds,
                timeout: self.settings.timeout(),
            },
        );

        let max_attempts = self.settings.retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match conversation.next_answer().await {
                Ok(answer) => return Ok(answer),
                Err(TurnError::Model(e)) => return Err(SearchAgentError::Model(e)),
                Err(TurnError::Retryable(failure)) => failure,
            };
            if attempt >= max_attempts {
                return Err(SearchAgentError::NoAnswer {
                    attempts: attempt,
                    last: failure,
                });
            }
            warn!(attempt, error = %failure, "Search attempt failed, retrying");
            conversation.push_user(format!(
                "The previous attempt failed because {failure}. Answer the question with the information you have."
            ));
        }
    }
}
