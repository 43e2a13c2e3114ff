//! OpenAI chat completion adapter for the reasoning loop.

use super::model::{ChatMessage, LanguageModel, ModelRequest, ModelResponse, ToolCallRequest};
use crate::config::GenerationSettings;
use crate::error::{KursError, Result};
use crate::openai::create_client;
use crate::tools::ToolDefinition;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Chat model backed by the OpenAI chat completions API.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIChatModel {
    /// Create a model from generation settings.
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

fn build_err(e: impl std::fmt::Display) -> KursError {
    KursError::Model(e.to_string())
}

/// Convert a tool definition into an OpenAI function tool.
pub fn to_openai_tool(def: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: def.name.clone(),
            description: Some(def.description.clone()),
            parameters: Some(def.input_schema.clone()),
            strict: None,
        },
    }
}

/// Flatten the system prompt and conversation into OpenAI messages.
///
/// A round's consolidated tool results become one `tool` message per call id.
pub fn to_openai_messages(
    system: &str,
    messages: &[ChatMessage],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut out: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system.to_string())
            .build()
            .map_err(build_err)?
            .into(),
    ];

    for message in messages {
        match message {
            ChatMessage::User(text) => out.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text.clone())
                    .build()
                    .map_err(build_err)?
                    .into(),
            ),
            ChatMessage::Assistant { text, tool_calls } => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(text) = text {
                    args.content(text.clone());
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.to_string(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                out.push(args.build().map_err(build_err)?.into());
            }
            ChatMessage::ToolResults(results) => {
                for result in results {
                    out.push(
                        ChatCompletionRequestToolMessageArgs::default()
                            .tool_call_id(result.call_id.clone())
                            .content(result.content.clone())
                            .build()
                            .map_err(build_err)?
                            .into(),
                    );
                }
            }
        }
    }

    Ok(out)
}

/// Parse OpenAI's string-encoded arguments.
///
/// Unparseable arguments are passed through as a JSON string so the tool
/// rejects them as a failed call.
fn parse_arguments(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    #[instrument(skip(self, request), fields(model = %self.model, offers_tools = request.tools.is_some()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(to_openai_messages(&request.system, &request.messages)?)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);

        if let Some(tools) = &request.tools {
            args.tools(tools.iter().map(to_openai_tool).collect::<Vec<_>>())
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        let response = self
            .client
            .chat()
            .create(args.build().map_err(build_err)?)
            .await
            .map_err(|e| KursError::OpenAI(format!("Chat completion failed: {}", e)))?;

        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| KursError::Model("No response from model".to_string()))?
            .message;

        let tool_calls: Vec<ToolCallRequest> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                arguments: parse_arguments(&call.function.arguments),
                name: call.function.name,
            })
            .collect();

        debug!("Model returned {} tool calls", tool_calls.len());

        Ok(ModelResponse {
            text: message.content,
            tool_calls,
        })
    }
}
