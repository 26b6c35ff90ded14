//! # Agent Tools
//!
//! Callables the model may invoke during a conversation. A [`ToolSet`] is the
//! dispatch table the conversation loop consults when the model answers with
//! tool calls.

use crate::{
    document::DocumentRef,
    errors::FetchError,
    fetcher::ContentFetcher,
    providers::ai::{ToolCall, ToolSpec},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{fmt::Debug, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("Failed to fetch document content: {0}")]
    Fetch(#[from] FetchError),
    #[error("Tool '{tool}' timed out after {elapsed:?}")]
    Timeout { tool: String, elapsed: Duration },
    #[error("Tool '{tool}' failed: {message}")]
    Failed { tool: String, message: String },
}

/// The JSON Schema of a tool that takes no arguments.
pub fn no_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false,
    })
}

/// A named function with a fixed input/output contract.
#[async_trait]
pub trait AgentTool: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// The JSON Schema of the tool's arguments.
    fn parameters(&self) -> Value {
        no_parameters()
    }

    async fn call(&self, arguments: &Value) -> Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// An ordered dispatch table of tools, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct ToolSet {
    tools: Vec<Arc<dyn AgentTool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Runs one tool call, bounded by `timeout`.
    pub async fn dispatch(&self, call: &ToolCall, timeout: Duration) -> Result<String, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        debug!(tool = %call.name, arguments = %call.arguments, "--> Dispatching tool call");

        match tokio::time::timeout(timeout, tool.call(&call.arguments)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: call.name.clone(),
                elapsed: timeout,
            }),
        }
    }
}

/// Fetches the raw text of the document bound to the current request.
#[derive(Debug)]
pub struct FetchContentTool {
    fetcher: Arc<dyn ContentFetcher>,
    document: DocumentRef,
}

impl FetchContentTool {
    pub const NAME: &'static str = "fetch_content";

    pub fn new(fetcher: Arc<dyn ContentFetcher>, document: DocumentRef) -> Self {
        Self { fetcher, document }
    }
}

#[async_trait]
impl AgentTool for FetchContentTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Fetches the document and returns its raw text (OCR output for images, extracted text for PDFs)."
    }

    async fn call(&self, _arguments: &Value) -> Result<String, ToolError> {
        let span = info_span!("fetching document content", document = %self.document);
        let text = self.fetcher.fetch(&self.document).instrument(span).await?;
        debug!(
            "Fetched {} characters from {}",
            text.chars().count(),
            self.document
        );
        Ok(text)
    }
}

/// Returns the name of the field the caller asked for.
#[derive(Debug)]
pub struct LookupFieldTool {
    field: String,
}

impl LookupFieldTool {
    pub const NAME: &'static str = "lookup_field";

    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

#[async_trait]
impl AgentTool for LookupFieldTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Returns the name of the field to extract from the document."
    }

    async fn call(&self, _arguments: &Value) -> Result<String, ToolError> {
        Ok(self.field.clone())
    }
}
