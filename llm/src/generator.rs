//! The generator abstraction: one request in, narrative text and/or tool
//! calls out.

use crate::error::LlmError;
use crate::message::{Message, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Core trait for text generation providers.
///
/// Implementations are treated as black boxes by the orchestration layer:
/// transient failures are retried internally, and a single error is
/// surfaced once retries are exhausted.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one completion round trip.
    async fn generate(&self, request: GenerationRequest) -> Result<Completion, LlmError>;

    /// Provider name, for logging.
    fn name(&self) -> &str;
}

/// Request for one generation round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model to use
    pub model: String,
    /// System prompt
    pub system: Option<String>,
    /// Conversation so far
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: Option<f32>,
    /// Tools the generator may invoke this round
    pub tools: Vec<ToolDefinition>,
}

impl GenerationRequest {
    /// Create a request for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: Vec::new(),
            max_tokens: 1024,
            temperature: None,
            tools: Vec::new(),
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the conversation messages
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 1.0));
        self
    }

    /// Set the tool definitions
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn
    EndTurn,
    /// Hit the max-tokens limit
    MaxTokens,
    /// Hit a stop sequence
    StopSequence,
    /// Model wants to use a tool
    ToolUse,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens
    pub input_tokens: usize,
    /// Output tokens
    pub output_tokens: usize,
}

impl TokenUsage {
    /// Total tokens used
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// Result of one generation round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The assistant message: narrative text and/or tool-use blocks
    pub message: Message,
    /// Why generation stopped
    pub stop_reason: StopReason,
    /// Token usage for the round
    pub usage: TokenUsage,
}

impl Completion {
    /// The narrative text of the completion.
    pub fn text(&self) -> String {
        self.message.text_content()
    }

    /// Whether the generator requested any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.message.has_tool_use()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let req = GenerationRequest::new("claude-sonnet-4-20250514")
            .with_system("You are the game master.")
            .with_messages(vec![Message::user("Hello")])
            .with_max_tokens(512)
            .with_temperature(0.8);

        assert_eq!(req.model, "claude-sonnet-4-20250514");
        assert_eq!(req.system.as_deref(), Some("You are the game master."));
        assert_eq!(req.max_tokens, 512);
        assert_eq!(req.temperature, Some(0.8));
    }

    #[test]
    fn temperature_is_clamped() {
        let req = GenerationRequest::new("m").with_temperature(3.0);
        assert_eq!(req.temperature, Some(1.0));
    }
}
