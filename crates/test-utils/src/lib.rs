use async_trait::async_trait;
use docextract::{
    errors::{FetchError, PromptError},
    eval::ReferenceSource,
    fetcher::ContentFetcher,
    providers::ai::{AiProvider, ChatRequest, Message, ModelTurn, ToolCall},
    DocumentRef,
};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

// --- Mock AI Provider ---

/// Replays programmed turns in order and records every request.
#[derive(Clone, Debug, Default)]
pub struct MockAiProvider {
    responses: Arc<Mutex<VecDeque<Result<ModelTurn, String>>>>,
    calls: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next turn the model will answer with.
    pub fn add_turn(&self, turn: ModelTurn) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(turn));
        self
    }

    pub fn add_final(&self, text: &str) -> &Self {
        self.add_turn(ModelTurn::Final(text.to_string()))
    }

    pub fn add_tool_call(&self, name: &str, arguments: Value) -> &Self {
        self.add_turn(ModelTurn::ToolCalls(vec![ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments,
        }]))
    }

    /// Queues a provider API error.
    pub fn add_error(&self, message: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Retrieves the recorded requests for assertion.
    pub fn get_calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelTurn, PromptError> {
        self.calls.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(turn)) => Ok(turn),
            Some(Err(message)) => Err(PromptError::AiApi(message)),
            None => Err(PromptError::AiApi(format!(
                "MockAiProvider: No response programmed. Got {} message(s) for system prompt '{}'",
                request.messages.len(),
                request.system_prompt
            ))),
        }
    }
}

/// The text of the most recent result of the named tool, if any.
pub fn last_tool_result<'a>(request: &'a ChatRequest, tool: &str) -> Option<&'a str> {
    request.messages.iter().rev().find_map(|m| match m {
        Message::Tool { name, content, .. } if name == tool => Some(content.as_str()),
        _ => None,
    })
}

/// A model stand-in that calls `fetch_content`, then answers with the
/// `key: value` lines of the fetched text that match the schema's fields.
#[derive(Clone, Debug, Default)]
pub struct FixtureReaderProvider;

#[async_trait]
impl AiProvider for FixtureReaderProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelTurn, PromptError> {
        let text = match last_tool_result(request, "fetch_content") {
            Some(text) if !text.starts_with("Error") => text,
            _ => {
                return Ok(ModelTurn::ToolCalls(vec![ToolCall {
                    id: "call_fetch".to_string(),
                    name: "fetch_content".to_string(),
                    arguments: json!({}),
                }]))
            }
        };

        let fields = request
            .output_schema
            .as_ref()
            .and_then(|s| s.schema["required"].as_array().cloned())
            .unwrap_or_default();
        let mut answer = Map::new();
        for field in fields.iter().filter_map(Value::as_str) {
            let value = text
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case(field))
                .map_or(Value::Null, |(_, value)| json!(value.trim()));
            answer.insert(field.to_string(), value);
        }
        Ok(ModelTurn::Final(Value::Object(answer).to_string()))
    }
}

// --- In-memory Fetcher and Reference Source ---

/// Serves fixed text per locator; unknown locators fail with a 404 status.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    texts: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, locator: &str, text: &str) -> Self {
        self.texts.insert(locator.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError> {
        self.texts
            .get(document.locator())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: document.to_string(),
                status: 404,
            })
    }
}

#[derive(Debug, Default, Clone)]
pub struct StaticReferenceSource {
    values: HashMap<String, HashMap<String, String>>,
}

impl StaticReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(mut self, locator: &str, values: &[(&str, &str)]) -> Self {
        self.values.insert(
            locator.to_string(),
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }
}

#[async_trait]
impl ReferenceSource for StaticReferenceSource {
    async fn load(&self, document: &DocumentRef) -> Result<HashMap<String, String>, FetchError> {
        self.values
            .get(document.locator())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: document.to_string(),
                status: 404,
            })
    }
}

// --- Test-Specific Helpers ---

pub mod helpers {
    /// Builds a PDF with one page per entry of `pages`, each line drawn with
    /// the standard Helvetica font so its text can be read back verbatim.
    #[cfg(feature = "pdf")]
    pub fn generate_test_pdf(pages: &[&[&str]]) -> anyhow::Result<Vec<u8>> {
        use lopdf::{
            content::{Content, Operation},
            dictionary, Document, Object, Stream,
        };

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("TL", vec![14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
            ];
            for (n, line) in lines.iter().enumerate() {
                if n > 0 {
                    operations.push(Operation::new("T*", vec![]));
                }
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Encodes a small blank JPEG, enough for a decoder to accept.
    #[cfg(feature = "image")]
    pub fn generate_test_jpeg() -> anyhow::Result<Vec<u8>> {
        let image = image::RgbImage::from_pixel(32, 16, image::Rgb([255, 255, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image).write_to(&mut bytes, image::ImageFormat::Jpeg)?;
        Ok(bytes.into_inner())
    }
}
