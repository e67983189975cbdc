//! Wire-level message types for generator conversations.
//!
//! A conversation is a list of role-tagged messages whose content is a list
//! of blocks: plain text, tool-use requests from the assistant, and tool
//! results sent back from our side.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Role of the message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Message from the player side
    User,
    /// Message from the generator
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Content block within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content
    Text {
        /// The text content
        text: String,
    },

    /// Tool invocation requested by the generator
    ToolUse {
        /// Provider-assigned id for this call, echoed back with the result
        id: String,
        /// Name of the tool to invoke
        name: String,
        /// Input arguments as JSON
        input: Value,
    },

    /// Result of a tool invocation (sent back on the user side)
    ToolResult {
        /// Id of the tool use this responds to
        tool_use_id: String,
        /// Result content
        content: String,
        /// Whether the tool execution failed
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Create a text content block
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Create a tool use content block
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool result content block
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// Get the text content if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Get tool use details if this is a tool use block
    pub fn as_tool_use(&self) -> Option<(&str, &str, &Value)> {
        match self {
            ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        }
    }
}

/// A message in a generator conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender
    pub role: Role,
    /// Content blocks
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// Create a user message carrying tool results
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self::new(Role::User, results)
    }

    /// Get all text content concatenated
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| block.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get all tool use blocks as (id, name, input)
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| block.as_tool_use())
            .collect()
    }

    /// Check if this message contains any tool use requests
    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.role, self.text_content())
    }
}

/// A tool the generator may invoke: name, description, and the JSON Schema
/// of its input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description shown to the generator
    pub description: String,
    /// Input parameter schema
    pub input_schema: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_text_content() {
        let msg = Message::user("I attack the goblin!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text_content(), "I attack the goblin!");
        assert!(!msg.has_tool_use());
    }

    #[test]
    fn message_tool_uses() {
        let msg = Message::new(
            Role::Assistant,
            vec![
                ContentBlock::text("Rolling for you."),
                ContentBlock::tool_use("call_1", "roll_dice", json!({"expression": "1d20"})),
            ],
        );

        assert!(msg.has_tool_use());
        let uses = msg.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "roll_dice");
    }

    #[test]
    fn message_serde_round_trip() {
        let msg = Message::tool_results(vec![ContentBlock::tool_result(
            "call_1",
            "You rolled 17",
            false,
        )]);
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.role, Role::User);
        assert_eq!(decoded.content.len(), 1);
    }
}
