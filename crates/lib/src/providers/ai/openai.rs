use crate::{
    errors::PromptError,
    providers::ai::{AiProvider, ChatRequest, Message, ModelTurn, ToolCall},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;
use tracing::debug;

/// The public OpenAI chat completions endpoint.
pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments.
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionChoice {
    message: WireMessage,
}

fn function_type() -> String {
    "function".to_string()
}

impl WireMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

fn to_wire_messages(request: &ChatRequest) -> Result<Vec<WireMessage>, PromptError> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(WireMessage::text("system", &request.system_prompt));

    for message in &request.messages {
        let wire = match message {
            Message::User(text) => WireMessage::text("user", text),
            Message::Assistant { text, tool_calls } => {
                let calls = tool_calls
                    .iter()
                    .map(|call| {
                        Ok(WireToolCall {
                            id: call.id.clone(),
                            kind: function_type(),
                            function: WireFunctionCall {
                                name: call.name.clone(),
                                arguments: serde_json::to_string(&call.arguments)?,
                            },
                        })
                    })
                    .collect::<Result<Vec<_>, serde_json::Error>>()?;
                WireMessage {
                    role: "assistant".to_string(),
                    content: text.clone(),
                    tool_calls: (!calls.is_empty()).then_some(calls),
                    tool_call_id: None,
                }
            }
            Message::Tool {
                call_id, content, ..
            } => WireMessage {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        };
        messages.push(wire);
    }
    Ok(messages)
}

// --- OpenAI Provider implementation ---

/// A provider for OpenAI or any OpenAI-compatible chat completions API
/// (including local servers).
#[derive(Clone, Debug)]
pub struct OpenAiProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl OpenAiProvider {
    /// Creates a new `OpenAiProvider` with its own HTTP client.
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, PromptError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(PromptError::ReqwestClientBuild)?;
        Ok(Self::with_client(client, api_url, api_key, model))
    }

    /// Creates a new `OpenAiProvider` sharing an existing connection pool.
    pub fn with_client(
        client: ReqwestClient,
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Self {
        Self {
            client,
            api_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelTurn, PromptError> {
        let tools = request
            .tools
            .iter()
            .map(|tool| WireTool {
                kind: "function",
                function: WireFunction {
                    name: &tool.name,
                    description: &tool.description,
                    parameters: &tool.parameters,
                },
            })
            .collect();

        let response_format = request.output_schema.as_ref().map(|output| {
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": output.name,
                    "schema": output.schema,
                    "strict": true,
                }
            })
        });

        let request_body = ChatCompletionRequest {
            messages: to_wire_messages(request)?,
            model: self.model.as_deref(),
            tools,
            response_format,
            temperature: 0.0,
            stream: false,
        };

        let mut request_builder = self.client.post(&self.api_url);

        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        let response = request_builder
            .json(&request_body)
            .send()
            .await
            .map_err(PromptError::AiRequest)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PromptError::AiApi(format!("status {status}: {error_text}")));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(PromptError::AiDeserialization)?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(PromptError::EmptyResponse)?;

        if let Some(calls) = message.tool_calls.filter(|calls| !calls.is_empty()) {
            let calls = calls
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: serde_json::from_str(&call.function.arguments)
                        .unwrap_or(Value::String(call.function.arguments)),
                })
                .collect::<Vec<_>>();
            debug!("<-- OpenAI requested {} tool call(s)", calls.len());
            return Ok(ModelTurn::ToolCalls(calls));
        }

        Ok(ModelTurn::Final(message.content.unwrap_or_default()))
    }
}
