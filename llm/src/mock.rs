//! Scripted generator for tests.

use crate::error::LlmError;
use crate::generator::{Completion, GenerationRequest, Generator, StopReason, TokenUsage};
use crate::message::{ContentBlock, Message, Role};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A [`Generator`] that plays back a fixed script of responses.
///
/// Each call pops the next scripted step; every request is recorded for
/// later inspection. An exhausted script keeps returning a plain
/// end-of-turn line so tests never hang on an empty queue.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Completion, LlmError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(Completion {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }));
    }

    /// Queue a reply requesting the given tool calls as (id, name, input).
    pub fn push_tool_calls(&self, calls: Vec<(&str, &str, Value)>) {
        let content = calls
            .into_iter()
            .map(|(id, name, input)| ContentBlock::tool_use(id, name, input))
            .collect();
        self.script.lock().unwrap().push_back(Ok(Completion {
            message: Message::new(Role::Assistant, content),
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }));
    }

    /// Queue an error.
    pub fn push_error(&self, error: LlmError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(step) => step,
            None => Ok(Completion {
                message: Message::assistant("The story continues."),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn plays_back_in_order() {
        let generator = ScriptedGenerator::new();
        generator.push_tool_calls(vec![("c1", "roll_dice", json!({"expression": "1d6"}))]);
        generator.push_text("You rolled well.");

        let first = generator
            .generate(GenerationRequest::new("test"))
            .await
            .unwrap();
        assert!(first.has_tool_calls());

        let second = generator
            .generate(GenerationRequest::new("test"))
            .await
            .unwrap();
        assert_eq!(second.text(), "You rolled well.");
        assert_eq!(generator.call_count(), 2);
    }
}
