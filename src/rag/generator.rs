//! Multi-round tool-calling loop.
//!
//! Each round sends the conversation to the model, optionally with tool
//! definitions. Requested tool calls run through a [`ToolExecutor`], their
//! results are appended, and the next round starts. After `max_rounds`
//! tool-enabled rounds the model is called once more without tools so a
//! text answer is always produced.

use super::model::{ChatMessage, LanguageModel, ModelRequest, ToolCallRequest, ToolResult};
use crate::error::{KursError, Result};
use crate::tools::{QueryContext, ToolExecutor};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Returned when a model call after the first round fails.
pub const MODEL_ERROR_MESSAGE: &str =
    "I encountered an error while processing your request. Please try again.";
/// Returned when any tool call in a round fails.
pub const TOOL_ERROR_MESSAGE: &str = "I encountered an issue while searching for information.";
/// Returned when the model asks for tools but none can be executed.
pub const NO_TOOLS_MESSAGE: &str = "I need to search for information to answer your question, \
     but search functionality is not available.";
/// Returned when the final tool-less round still yields no text.
pub const NO_ANSWER_MESSAGE: &str =
    "I couldn't put together an answer to that question. Please try rephrasing it.";
/// Stands in for an empty tool output.
pub const EMPTY_TOOL_RESULT: &str = "No results found.";

/// States of one reasoning run.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCallRequest>),
    Done(String),
}

/// Drives the model through bounded rounds of tool use.
pub struct ResponseGenerator {
    model: Arc<dyn LanguageModel>,
    max_rounds: usize,
}

impl ResponseGenerator {
    /// Create a generator allowing `max_rounds` tool-enabled rounds.
    pub fn new(model: Arc<dyn LanguageModel>, max_rounds: usize) -> Result<Self> {
        if max_rounds == 0 {
            return Err(KursError::Config(
                "max_rounds must be a positive integer".to_string(),
            ));
        }
        Ok(Self { model, max_rounds })
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Answer `query`.
    ///
    /// `system` is the full system prompt, history included. Only a failure
    /// of the first model call is returned as `Err`; every later failure
    /// resolves to a fixed message.
    #[instrument(skip_all, fields(max_rounds = self.max_rounds))]
    pub async fn generate(
        &self,
        query: &str,
        system: &str,
        tools: Option<&dyn ToolExecutor>,
        ctx: &mut QueryContext,
    ) -> Result<String> {
        let mut run = ReasoningRun::new(self, query, system, tools);
        while !run.is_done() {
            run.step(ctx).await?;
        }
        Ok(run.into_answer())
    }
}

/// A single query's pass through the state machine.
pub struct ReasoningRun<'a> {
    generator: &'a ResponseGenerator,
    tools: Option<&'a dyn ToolExecutor>,
    system: String,
    messages: Vec<ChatMessage>,
    round: usize,
    state: LoopState,
}

impl<'a> ReasoningRun<'a> {
    pub fn new(
        generator: &'a ResponseGenerator,
        query: &str,
        system: &str,
        tools: Option<&'a dyn ToolExecutor>,
    ) -> Self {
        Self {
            generator,
            tools,
            system: system.to_string(),
            messages: vec![ChatMessage::User(query.to_string())],
            round: 1,
            state: LoopState::AwaitingModel,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Current round, starting at 1.
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, LoopState::Done(_))
    }

    /// Final answer; empty if the run has not finished.
    pub fn into_answer(self) -> String {
        match self.state {
            LoopState::Done(answer) => answer,
            _ => String::new(),
        }
    }

    fn tools_enabled(&self) -> bool {
        self.round <= self.generator.max_rounds
    }

    /// Advance one transition.
    pub async fn step(&mut self, ctx: &mut QueryContext) -> Result<()> {
        let state = std::mem::replace(&mut self.state, LoopState::AwaitingModel);
        self.state = match state {
            LoopState::AwaitingModel => self.call_model().await?,
            LoopState::ExecutingTools(calls) => self.execute_tools(calls, ctx).await,
            done @ LoopState::Done(_) => done,
        };
        Ok(())
    }

    async fn call_model(&mut self) -> Result<LoopState> {
        let offered = match self.tools {
            Some(tools) if self.tools_enabled() => Some(tools.definitions()),
            _ => None,
        };
        info!(
            "Round {}: calling model ({} tools offered)",
            self.round,
            offered.as_ref().map_or(0, Vec::len)
        );

        let request = ModelRequest {
            system: self.system.clone(),
            messages: self.messages.clone(),
            tools: offered,
        };

        let response = match self.generator.model.complete(&request).await {
            Ok(response) => response,
            Err(e) if self.round == 1 => return Err(e),
            Err(e) => {
                warn!("Model call failed in round {}: {}", self.round, e);
                return Ok(LoopState::Done(MODEL_ERROR_MESSAGE.to_string()));
            }
        };

        if !response.wants_tools() {
            return Ok(LoopState::Done(response.text.unwrap_or_default()));
        }

        if self.tools.is_none() {
            warn!("Model requested tools but no executor is configured");
            return Ok(LoopState::Done(NO_TOOLS_MESSAGE.to_string()));
        }

        if !self.tools_enabled() {
            // Tools were not offered; never pass the request through as an answer.
            warn!("Model requested tools after the round limit");
            let answer = response
                .text
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| NO_ANSWER_MESSAGE.to_string());
            return Ok(LoopState::Done(answer));
        }

        self.messages.push(ChatMessage::Assistant {
            text: response.text,
            tool_calls: response.tool_calls.clone(),
        });
        Ok(LoopState::ExecutingTools(response.tool_calls))
    }

    async fn execute_tools(
        &mut self,
        calls: Vec<ToolCallRequest>,
        ctx: &mut QueryContext,
    ) -> LoopState {
        let Some(tools) = self.tools else {
            return LoopState::Done(NO_TOOLS_MESSAGE.to_string());
        };

        let mut results = Vec::with_capacity(calls.len());
        let mut failed = false;

        // Sequential, in request order.
        for call in &calls {
            let content = match tools.execute(&call.name, &call.arguments, ctx).await {
                Ok(output) if output.trim().is_empty() => EMPTY_TOOL_RESULT.to_string(),
                Ok(output) => output,
                Err(e) => {
                    warn!("Tool {} failed: {}", call.name, e);
                    failed = true;
                    format!("Tool execution failed: {}", e)
                }
            };
            debug!("Tool {} returned {} bytes", call.name, content.len());
            results.push(ToolResult {
                call_id: call.id.clone(),
                content,
            });
        }

        self.messages.push(ChatMessage::ToolResults(results));

        if failed {
            return LoopState::Done(TOOL_ERROR_MESSAGE.to_string());
        }

        self.round += 1;
        LoopState::AwaitingModel
    }
}
