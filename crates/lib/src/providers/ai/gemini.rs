use crate::{
    errors::PromptError,
    providers::ai::{AiProvider, ChatRequest, Message, ModelTurn, ToolCall, ToolSpec},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use tracing::debug;

/// Builds the `generateContent` endpoint for a Gemini model.
pub fn gemini_api_url(model_name: &str) -> String {
    format!("https://generativelanguage.googleapis.com/v1beta/models/{model_name}:generateContent")
}

// --- Gemini-specific request and response structures ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Content,
}

impl Content {
    fn new(role: &str, parts: Vec<Part>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }
}

/// Gemini rejects `additionalProperties` and empty parameter objects.
fn to_declaration(tool: &ToolSpec) -> FunctionDeclaration {
    let mut parameters = tool.parameters.clone();
    if let Some(object) = parameters.as_object_mut() {
        object.remove("additionalProperties");
    }
    let has_properties = parameters
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());

    FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: has_properties.then_some(parameters),
    }
}

fn to_contents(messages: &[Message]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::with_capacity(messages.len());

    for message in messages {
        match message {
            Message::User(text) => contents.push(Content::new("user", vec![Part::text(text)])),
            Message::Assistant { text, tool_calls } => {
                let mut parts: Vec<Part> = text.iter().map(|t| Part::text(t)).collect();
                parts.extend(tool_calls.iter().map(|call| Part {
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Default::default()
                }));
                contents.push(Content::new("model", parts));
            }
            Message::Tool { name, content, .. } => {
                let part = Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: serde_json::json!({ "content": content }),
                    }),
                    ..Default::default()
                };
                // Responses to one round of calls travel together.
                match contents.last_mut() {
                    Some(last)
                        if last.role.as_deref() == Some("user")
                            && last.parts.iter().all(|p| p.function_response.is_some()) =>
                    {
                        last.parts.push(part)
                    }
                    _ => contents.push(Content::new("user", vec![part])),
                }
            }
        }
    }
    contents
}

// --- Gemini Provider implementation ---

/// A provider for interacting with the Google Gemini API.
#[derive(Clone, Debug)]
pub struct GeminiProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider` with its own HTTP client.
    pub fn new(api_url: String, api_key: String) -> Result<Self, PromptError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(PromptError::ReqwestClientBuild)?;
        Ok(Self::with_client(client, api_url, api_key))
    }

    /// Creates a new `GeminiProvider` sharing an existing connection pool.
    pub fn with_client(client: ReqwestClient, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelTurn, PromptError> {
        let tools = if request.tools.is_empty() {
            vec![]
        } else {
            vec![GeminiTool {
                function_declarations: request.tools.iter().map(to_declaration).collect(),
            }]
        };

        // JSON mode cannot be combined with function calling.
        let response_mime_type = (request.output_schema.is_some() && tools.is_empty())
            .then_some("application/json");

        let request_body = GeminiRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(&request.system_prompt)],
            },
            contents: to_contents(&request.messages),
            tools,
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type,
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", &self.api_key)])
            .json(&request_body)
            .send()
            .await
            .map_err(PromptError::AiRequest)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PromptError::AiApi(format!("status {status}: {error_text}")));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(PromptError::AiDeserialization)?;

        let parts = gemini_response
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts)
            .ok_or(PromptError::EmptyResponse)?;

        let calls: Vec<ToolCall> = parts
            .iter()
            .filter_map(|p| p.function_call.as_ref())
            .enumerate()
            .map(|(i, call)| ToolCall {
                id: format!("{}-{i}", call.name),
                name: call.name.clone(),
                arguments: call.args.clone(),
            })
            .collect();

        if !calls.is_empty() {
            debug!("<-- Gemini requested {} tool call(s)", calls.len());
            return Ok(ModelTurn::ToolCalls(calls));
        }

        let text = parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        Ok(ModelTurn::Final(text))
    }
}
