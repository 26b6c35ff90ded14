#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Scripted and fixture-driven providers, plus in-memory fetchers and
//! reference sources, so agent and harness tests run without any network.

use async_trait::async_trait;
use docextract::{
    errors::{FetchError, PromptError},
    eval::ReferenceSource,
    fetcher::ContentFetcher,
    providers::ai::{AiProvider, ChatRequest, Message, ModelTurn, ToolCall},
    DocumentRef,
};
use serde_json::{json, Map, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Once, RwLock,
    },
    time::Duration,
};

static INIT: Once = Once::new();

/// Initializes the tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

pub fn tool_call(name: &str) -> ToolCall {
    ToolCall {
        id: format!("call-{name}"),
        name: name.to_string(),
        arguments: json!({}),
    }
}

pub fn receipt_json(total: Option<&str>) -> String {
    json!({
        "company": "ACME STORE",
        "date": null,
        "address": null,
        "total": total,
    })
    .to_string()
}

// --- Scripted AI Provider ---

/// Replays a fixed sequence of turns and records every request it receives.
#[derive(Clone, Debug)]
pub struct MockAiProvider {
    pub call_history: Arc<RwLock<Vec<ChatRequest>>>,
    responses: Arc<RwLock<Vec<Result<ModelTurn, String>>>>,
}

impl MockAiProvider {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self::with_results(turns.into_iter().map(Ok).collect())
    }

    /// `Err(message)` entries are returned as provider API errors.
    pub fn with_results(results: Vec<Result<ModelTurn, String>>) -> Self {
        Self {
            call_history: Arc::new(RwLock::new(Vec::new())),
            responses: Arc::new(RwLock::new(results.into_iter().rev().collect())),
        }
    }

    pub fn calls(&self) -> usize {
        self.call_history.read().unwrap().len()
    }

    pub fn request(&self, index: usize) -> ChatRequest {
        self.call_history.read().unwrap()[index].clone()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelTurn, PromptError> {
        self.call_history.write().unwrap().push(request.clone());
        match self.responses.write().unwrap().pop() {
            Some(Ok(turn)) => Ok(turn),
            Some(Err(message)) => Err(PromptError::AiApi(message)),
            None => Ok(ModelTurn::Final("Default mock response".to_string())),
        }
    }
}

// --- Fixture-reading AI Provider ---

/// A stand-in model that asks for `fetch_content` until it has the document
/// text, then answers with every `key: value` line whose key is a schema
/// field. Stateless per request, so it is safe under concurrent evaluation.
#[derive(Clone, Debug, Default)]
pub struct FixtureReaderProvider {
    calls: Arc<AtomicUsize>,
}

impl FixtureReaderProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiProvider for FixtureReaderProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelTurn, PromptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let fetched = request.messages.iter().rev().find_map(|m| match m {
            Message::Tool { name, content, .. } if name == "fetch_content" => Some(content),
            _ => None,
        });
        let text = match fetched {
            Some(content) if !content.starts_with("Error") => content,
            _ => return Ok(ModelTurn::ToolCalls(vec![tool_call("fetch_content")])),
        };

        let required: Vec<String> = request
            .output_schema
            .as_ref()
            .and_then(|s| s.schema.get("required"))
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut answer = Map::new();
        for field in required {
            let value = text
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case(&field))
                .map(|(_, value)| Value::String(value.trim().to_string()))
                .unwrap_or(Value::Null);
            answer.insert(field, value);
        }
        Ok(ModelTurn::Final(Value::Object(answer).to_string()))
    }
}

/// Never answers within any reasonable timeout.
#[derive(Clone, Debug)]
pub struct SlowProvider(pub Duration);

#[async_trait]
impl AiProvider for SlowProvider {
    async fn chat(&self, _request: &ChatRequest) -> Result<ModelTurn, PromptError> {
        tokio::time::sleep(self.0).await;
        Ok(ModelTurn::Final("{}".to_string()))
    }
}

// --- In-memory fetcher and reference source ---

/// Serves fixed text by locator; unknown locators fail like a missing image.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    texts: HashMap<String, String>,
    pub fetches: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(texts: &[(&str, &str)]) -> Self {
        Self {
            texts: texts
                .iter()
                .map(|(locator, text)| (locator.to_string(), text.to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.texts
            .get(document.locator())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: format!("memory://img/{}.jpg", document.locator()),
                status: 404,
            })
    }
}

/// Counts fetches but never returns within any reasonable timeout.
#[derive(Debug)]
pub struct SlowFetcher {
    delay: Duration,
    pub fetches: AtomicUsize,
}

impl SlowFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentFetcher for SlowFetcher {
    async fn fetch(&self, _document: &DocumentRef) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(String::new())
    }
}

#[derive(Debug, Default)]
pub struct StaticReferenceSource {
    values: HashMap<String, HashMap<String, String>>,
    pub loads: AtomicUsize,
}

impl StaticReferenceSource {
    pub fn new(entries: &[(&str, &[(&str, &str)])]) -> Self {
        Self {
            values: entries
                .iter()
                .map(|(locator, fields)| {
                    (
                        locator.to_string(),
                        fields
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect(),
                    )
                })
                .collect(),
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReferenceSource for StaticReferenceSource {
    async fn load(&self, document: &DocumentRef) -> Result<HashMap<String, String>, FetchError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.values
            .get(document.locator())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: format!("memory://key/{}.json", document.locator()),
                status: 404,
            })
    }
}
