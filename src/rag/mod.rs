//! Answer generation: the language model interface and the tool-calling loop.

mod generator;
mod model;
mod openai;

pub use generator::{
    LoopState, ReasoningRun, ResponseGenerator, EMPTY_TOOL_RESULT, MODEL_ERROR_MESSAGE,
    NO_ANSWER_MESSAGE, NO_TOOLS_MESSAGE, TOOL_ERROR_MESSAGE,
};
pub use model::{
    ChatMessage, LanguageModel, ModelRequest, ModelResponse, ToolCallRequest, ToolResult,
};
pub use openai::{to_openai_messages, to_openai_tool, OpenAIChatModel};
