pub mod gemini;
pub mod openai;

use crate::errors::PromptError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

/// The declared shape of one callable tool, as sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// A JSON Schema object describing the tool's arguments.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back with the tool result.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry of a provider-neutral conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User(String),
    Assistant {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        name: String,
        content: String,
    },
}

/// The required shape of the model's final answer.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

/// Everything a provider needs for one model invocation.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub output_schema: Option<OutputSchema>,
}

/// What the model answered in one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// The model wants one or more tools called before it answers.
    ToolCalls(Vec<ToolCall>),
    /// The model's final text answer.
    Final(String),
}

/// A trait for interacting with an AI provider.
///
/// Implementations translate a provider-neutral [`ChatRequest`] into one API
/// call and report either the tool calls the model asked for or its final
/// answer. The conversation loop lives in the caller.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelTurn, PromptError>;
}

dyn_clone::clone_trait_object!(AiProvider);
