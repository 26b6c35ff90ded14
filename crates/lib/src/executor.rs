//! # The Conversation Executor
//!
//! This module drives one model conversation: it sends the accumulated
//! messages to the provider, dispatches any tool calls the model asks for,
//! appends their results and repeats until the model produces a final text
//! answer. Retry policy is left to the caller; the executor only reports
//! whether a failure is retryable.

use crate::{
    errors::PromptError,
    providers::ai::{AiProvider, ChatRequest, Message, ModelTurn, OutputSchema},
    schema::ValidationFailure,
    tools::{ToolError, ToolSet},
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Bounds applied to every conversation.
#[derive(Debug, Clone, Copy)]
pub struct ConversationLimits {
    /// How many model answers consisting only of tool calls are allowed
    /// before a final answer is required.
    pub max_tool_rounds: usize,
    /// Applied independently to every model call and every tool call.
    pub timeout: Duration,
}

/// A failure that ends one attempt but may be recovered by asking again.
#[derive(Error, Debug)]
pub enum AttemptFailure {
    #[error("the output did not match the schema: {0}")]
    Validation(#[from] ValidationFailure),
    #[error("a tool call failed: {0}")]
    Tool(ToolError),
    #[error("the model did not answer within {0:?}")]
    ModelTimeout(Duration),
    #[error("the model requested more than {0} rounds of tool calls")]
    ToolRoundsExceeded(usize),
}

/// Why [`Conversation::next_answer`] did not produce an answer.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error(transparent)]
    Retryable(AttemptFailure),
    #[error(transparent)]
    Model(#[from] PromptError),
}

/// One model conversation with a fixed tool set.
pub struct Conversation<'a> {
    provider: &'a dyn AiProvider,
    tools: &'a ToolSet,
    request: ChatRequest,
    limits: ConversationLimits,
    model_calls: usize,
}

impl<'a> Conversation<'a> {
    pub fn new(
        provider: &'a dyn AiProvider,
        tools: &'a ToolSet,
        system_prompt: String,
        user_prompt: String,
        output_schema: Option<OutputSchema>,
        limits: ConversationLimits,
    ) -> Self {
        let request = ChatRequest {
            system_prompt,
            messages: vec![Message::User(user_prompt)],
            tools: tools.specs(),
            output_schema,
        };
        Self {
            provider,
            tools,
            request,
            limits,
            model_calls: 0,
        }
    }

    /// How many times the provider has been invoked so far.
    pub fn model_calls(&self) -> usize {
        self.model_calls
    }

    pub fn messages(&self) -> &[Message] {
        &self.request.messages
    }

    /// Appends a user message, typically feedback about a failed attempt.
    pub fn push_user(&mut self, text: String) {
        self.request.messages.push(Message::User(text));
    }

    /// Runs model calls and tool rounds until the model gives a final answer.
    ///
    /// The final answer is recorded in the conversation before it is returned.
    /// Fetch failures and timeouts end the attempt as retryable; unknown tools
    /// and bad arguments are reported back to the model and the round goes on.
    pub async fn next_answer(&mut self) -> Result<String, TurnError> {
        let mut rounds = 0;
        loop {
            self.model_calls += 1;
            debug!(
                call = self.model_calls,
                messages = self.request.messages.len(),
                "--> Invoking model"
            );
            let turn = tokio::time::timeout(self.limits.timeout, self.provider.chat(&self.request))
                .await
                .map_err(|_| TurnError::Retryable(AttemptFailure::ModelTimeout(self.limits.timeout)))??;

            let calls = match turn {
                ModelTurn::Final(text) => {
                    debug!("<-- Model answer: {}", text);
                    self.request.messages.push(Message::Assistant {
                        text: Some(text.clone()),
                        tool_calls: vec![],
                    });
                    return Ok(text);
                }
                ModelTurn::ToolCalls(calls) => calls,
            };

            self.request.messages.push(Message::Assistant {
                text: None,
                tool_calls: calls.clone(),
            });

            if rounds >= self.limits.max_tool_rounds {
                // Every call still needs a matching result for the transcript to stay valid.
                for call in &calls {
                    self.request.messages.push(Message::Tool {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        content: "Error: tool call limit reached. Answer now with the information you have.".to_string(),
                    });
                }
                return Err(TurnError::Retryable(AttemptFailure::ToolRoundsExceeded(
                    self.limits.max_tool_rounds,
                )));
            }
            rounds += 1;

            let mut fatal: Option<ToolError> = None;
            for call in &calls {
                let content = match self.tools.dispatch(call, self.limits.timeout).await {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool call failed");
                        let content = format!("Error: {e}");
                        if fatal.is_none()
                            && matches!(e, ToolError::Fetch(_) | ToolError::Timeout { .. })
                        {
                            fatal = Some(e);
                        }
                        content
                    }
                };
                self.request.messages.push(Message::Tool {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    content,
                });
            }

            if let Some(e) = fatal {
                return Err(TurnError::Retryable(AttemptFailure::Tool(e)));
            }
        }
    }
}
